//! Transaction Atomicity Tests
//!
//! - A batch applies every step or none
//! - Callbacks run only after a successful commit
//! - A transaction is confined to one partition

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rpdb::api::{Cluster, NodePool, Operation, OperationRequest, SubscriptionState, Subscription};
use rpdb::arm::PartitionKey;
use rpdb::clock::SystemClock;
use rpdb::document::AnyResource;
use rpdb::store::MemoryStore;
use rpdb::{DbClient, DbError};

fn setup() -> (Arc<MemoryStore>, DbClient) {
    let store = Arc::new(MemoryStore::new());
    let client = DbClient::new(store.clone());
    (store, client)
}

fn partition() -> PartitionKey {
    PartitionKey::new("sub").unwrap()
}

// =============================================================================
// All or Nothing
// =============================================================================

/// A cluster and its operation commit together and read back by key.
#[test]
fn test_commit_applies_every_step() {
    let (_, db) = setup();
    let clusters = db.clusters("sub", "rg").unwrap();
    let operations = db.operations("sub").unwrap();

    let cluster_id = clusters.make_resource_id("c1").unwrap();
    let op = Operation::new(OperationRequest::Create, "sub", Some(cluster_id.clone()), &SystemClock)
        .unwrap();
    let mut cluster = Cluster::new(cluster_id, "eastus");
    cluster.active_operation_id = Some(op.name().to_string());

    let mut tx = db.new_transaction(&partition());
    let cluster_key = clusters.add_create_to_transaction(&mut tx, &cluster).unwrap();
    let op_key = operations.add_create_to_transaction(&mut tx, &op).unwrap();
    assert_eq!(tx.len(), 2);

    let result = tx.execute().unwrap();
    assert_eq!(result.len(), 2);

    let committed: Cluster = result.get_item_as(&cluster_key).unwrap();
    assert_eq!(committed.active_operation_id.as_deref(), Some(op.name()));
    assert!(matches!(result.get_item(&op_key).unwrap(), AnyResource::Operation(_)));

    assert_eq!(clusters.get_by_name("c1").unwrap(), committed);
    assert_eq!(operations.get(&op.id).unwrap().status, op.status);
}

/// One failing step leaves the store exactly as it was.
#[test]
fn test_failed_step_rolls_back_everything() {
    let (store, db) = setup();
    let clusters = db.clusters("sub", "rg").unwrap();
    clusters
        .create(&Cluster::new(clusters.make_resource_id("existing").unwrap(), "eastus"))
        .unwrap();
    let before = store.len();

    let mut tx = db.new_transaction(&partition());
    clusters
        .add_create_to_transaction(
            &mut tx,
            &Cluster::new(clusters.make_resource_id("new").unwrap(), "eastus"),
        )
        .unwrap();
    clusters
        .add_create_to_transaction(
            &mut tx,
            &Cluster::new(clusters.make_resource_id("existing").unwrap(), "eastus"),
        )
        .unwrap();

    let err = tx.execute().unwrap_err();
    assert!(err.is_conflict());
    assert!(err.to_string().contains("step 2 of 2"));

    assert_eq!(store.len(), before);
    assert!(clusters.get_by_name("new").unwrap_err().is_not_found());
}

/// A stale ETag inside a batch fails the whole batch.
#[test]
fn test_stale_replace_in_batch() {
    let (_, db) = setup();
    let clusters = db.clusters("sub", "rg").unwrap();
    let created = clusters
        .create(&Cluster::new(clusters.make_resource_id("c1").unwrap(), "eastus"))
        .unwrap();
    let mut moved = created.clone();
    moved.location = "westus".into();
    clusters.replace(&moved).unwrap();

    let pools = db.node_pools("sub", "rg", "c1").unwrap();
    let mut tx = db.new_transaction(&partition());
    pools
        .add_create_to_transaction(&mut tx, &NodePool::new(pools.make_resource_id("np").unwrap()))
        .unwrap();
    clusters.add_replace_to_transaction(&mut tx, &created).unwrap();

    assert!(tx.execute().unwrap_err().is_precondition_failed());
    assert!(pools.get_by_name("np").unwrap_err().is_not_found());
}

/// Deletes in a batch remove their documents on commit.
#[test]
fn test_delete_in_batch() {
    let (_, db) = setup();
    let clusters = db.clusters("sub", "rg").unwrap();
    let created = clusters
        .create(&Cluster::new(clusters.make_resource_id("c1").unwrap(), "eastus"))
        .unwrap();

    let mut tx = db.new_transaction(&partition());
    clusters.add_delete_to_transaction(&mut tx, &created.id).unwrap();
    let result = tx.execute().unwrap();

    assert!(result.is_empty());
    assert!(clusters.get(&created.id).unwrap_err().is_not_found());
}

// =============================================================================
// Callbacks
// =============================================================================

/// Callbacks run once, in order, after commit and never on failure.
#[test]
fn test_callbacks_follow_commit() {
    let (_, db) = setup();
    let clusters = db.clusters("sub", "rg").unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut tx = db.new_transaction(&partition());
    clusters
        .add_create_to_transaction(
            &mut tx,
            &Cluster::new(clusters.make_resource_id("c1").unwrap(), "eastus"),
        )
        .unwrap();
    let first = calls.clone();
    tx.on_success(move |result| {
        assert_eq!(result.len(), 1);
        assert_eq!(first.fetch_add(1, Ordering::SeqCst), 0);
    });
    let second = calls.clone();
    tx.on_success(move |_| {
        assert_eq!(second.fetch_add(1, Ordering::SeqCst), 1);
    });
    tx.execute().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let mut failing = db.new_transaction(&partition());
    clusters
        .add_create_to_transaction(
            &mut failing,
            &Cluster::new(clusters.make_resource_id("c1").unwrap(), "eastus"),
        )
        .unwrap();
    let third = calls.clone();
    failing.on_success(move |_| {
        third.fetch_add(1, Ordering::SeqCst);
    });
    assert!(failing.execute().is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// An empty transaction commits nothing and still runs its callbacks.
#[test]
fn test_empty_transaction_succeeds() {
    let (store, db) = setup();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut tx = db.new_transaction(&partition());
    let counter = calls.clone();
    tx.on_success(move |result| {
        assert!(result.is_empty());
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(tx.execute().unwrap().is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(store.is_empty());
}

// =============================================================================
// Partition Confinement
// =============================================================================

/// Steps for another partition are refused when queued.
#[test]
fn test_step_from_other_partition_is_refused() {
    let (_, db) = setup();
    let subs = db.subscriptions();
    let other = Subscription::new("other", SubscriptionState::Registered).unwrap();

    let mut tx = db.new_transaction(&partition());
    let err = subs.add_create_to_transaction(&mut tx, &other).unwrap_err();
    assert!(matches!(err, DbError::WrongPartition { .. }));
    assert!(tx.is_empty());
}
