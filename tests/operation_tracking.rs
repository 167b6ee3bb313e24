//! Async Operation Tracking Tests
//!
//! - Only non-terminal operations are listed as active
//! - Terminal states are absorbing
//! - Status changes are mirrored onto the target resource
//! - The async notification is posted exactly once

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use parking_lot::Mutex;

use rpdb::api::{
    CloudErrorBody, Cluster, NodePool, Operation, OperationRequest, ProvisioningState,
};
use rpdb::clock::{Clock, ManualClock};
use rpdb::operations::{ActiveOperationFilter, AsyncNotifier, NotificationError};
use rpdb::store::MemoryStore;
use rpdb::{DbClient, DbError, DbResult};

#[derive(Default)]
struct Recorder {
    posted: Mutex<Vec<String>>,
}

impl AsyncNotifier for Recorder {
    fn post(&self, operation: &Operation) -> Result<(), NotificationError> {
        self.posted.lock().push(operation.name().to_string());
        Ok(())
    }
}

struct Unreachable;

impl AsyncNotifier for Unreachable {
    fn post(&self, _operation: &Operation) -> Result<(), NotificationError> {
        Err(NotificationError("connection refused".into()))
    }
}

struct Fixture {
    db: DbClient,
    clock: Arc<ManualClock>,
}

impl Fixture {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()));
        let db = DbClient::new(Arc::new(MemoryStore::new())).with_clock(clock.clone());
        Self { db, clock }
    }

    /// A cluster being created by a fresh operation; returns both as stored.
    fn creating_cluster(&self, name: &str) -> (Cluster, Operation) {
        let clusters = self.db.clusters("sub", "rg").unwrap();
        let id = clusters.make_resource_id(name).unwrap();
        let mut op =
            Operation::new(OperationRequest::Create, "sub", Some(id.clone()), self.clock.as_ref())
                .unwrap();
        op.notification_uri = Some("https://arm.example/notify".into());
        let op = self.db.operations("sub").unwrap().create(&op).unwrap();

        let mut cluster = Cluster::new(id, "eastus");
        cluster.active_operation_id = Some(op.name().to_string());
        (clusters.create(&cluster).unwrap(), op)
    }

    fn operation_with_status(&self, status: ProvisioningState) -> Operation {
        let mut op =
            Operation::new(OperationRequest::Update, "sub", None, self.clock.as_ref()).unwrap();
        op.status = status;
        self.db.operations("sub").unwrap().create(&op).unwrap()
    }

    fn active(&self, filter: &ActiveOperationFilter) -> Vec<Operation> {
        self.db
            .operations("sub")
            .unwrap()
            .list_active_operations(filter)
            .unwrap()
            .collect::<DbResult<_>>()
            .unwrap()
    }
}

// =============================================================================
// Active Operations
// =============================================================================

/// Succeeded and Failed operations are not active.
#[test]
fn test_terminal_operations_are_not_active() {
    let f = Fixture::new();
    let accepted = f.operation_with_status(ProvisioningState::Accepted);
    f.operation_with_status(ProvisioningState::Succeeded);
    f.operation_with_status(ProvisioningState::Failed);

    let active = f.active(&ActiveOperationFilter::default());
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, accepted.id);
}

/// The target filter matches exactly, or the whole subtree when nested.
#[test]
fn test_active_operations_by_target() {
    let f = Fixture::new();
    let (cluster, cluster_op) = f.creating_cluster("c1");

    let pools = f.db.node_pools("sub", "rg", "c1").unwrap();
    let pool_id = pools.make_resource_id("np").unwrap();
    let pool_op =
        Operation::new(OperationRequest::Create, "sub", Some(pool_id.clone()), f.clock.as_ref())
            .unwrap();
    f.db.operations("sub").unwrap().create(&pool_op).unwrap();
    pools.create(&NodePool::new(pool_id)).unwrap();

    let exact = f.active(&ActiveOperationFilter::for_resource(cluster.id.clone(), false));
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].id, cluster_op.id);

    let nested = f.active(&ActiveOperationFilter::for_resource(cluster.id, true));
    assert_eq!(nested.len(), 2);

    let deletes = f.active(&ActiveOperationFilter::for_request(OperationRequest::Delete));
    assert!(deletes.is_empty());
}

// =============================================================================
// Status Transitions
// =============================================================================

/// A full create lifecycle: provisioning, then success with notification.
#[test]
fn test_lifecycle_mirrors_onto_cluster() {
    let f = Fixture::new();
    let tracker = f.db.operation_tracker();
    let recorder = Recorder::default();
    let (cluster, op) = f.creating_cluster("c1");
    let clusters = f.db.clusters("sub", "rg").unwrap();

    f.clock.advance(Duration::seconds(30));
    let op = tracker
        .update_status(&op, ProvisioningState::Provisioning, None, Some(&recorder))
        .unwrap();
    assert_eq!(op.last_transition_time, f.clock.now());
    let current = clusters.get(&cluster.id).unwrap();
    assert_eq!(current.provisioning_state, ProvisioningState::Provisioning);
    assert_eq!(current.active_operation_id.as_deref(), Some(op.name()));
    assert!(recorder.posted.lock().is_empty());

    f.clock.advance(Duration::seconds(30));
    let op = tracker
        .update_status(&op, ProvisioningState::Succeeded, None, Some(&recorder))
        .unwrap();
    assert_eq!(op.status, ProvisioningState::Succeeded);
    assert!(op.notification_uri.is_none());
    assert_eq!(recorder.posted.lock().as_slice(), [op.name().to_string()]);
    assert!(op.to_status().end_time.is_some());

    let current = clusters.get(&cluster.id).unwrap();
    assert_eq!(current.provisioning_state, ProvisioningState::Succeeded);
    assert!(current.active_operation_id.is_none());
    assert!(f.active(&ActiveOperationFilter::default()).is_empty());

    // Already notified and unchanged: nothing more to do.
    let again = tracker
        .patch_status(&op, ProvisioningState::Succeeded, None, Some(&recorder))
        .unwrap();
    assert_eq!(again.etag, op.etag);
    assert_eq!(recorder.posted.lock().len(), 1);
}

/// Nothing moves an operation out of a terminal state.
#[test]
fn test_terminal_state_is_absorbing() {
    let f = Fixture::new();
    let tracker = f.db.operation_tracker();
    let (_, op) = f.creating_cluster("c1");
    let failed = tracker
        .patch_status(
            &op,
            ProvisioningState::Failed,
            Some(CloudErrorBody::new("InternalServerError", "boom")),
            None,
        )
        .unwrap();
    assert_eq!(failed.error.as_ref().map(|e| e.code.as_str()), Some("InternalServerError"));

    let err = tracker
        .patch_status(&failed, ProvisioningState::Provisioning, None, None)
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidArgument(_)));
}

/// A failed notification is logged, not returned, and stays pending.
#[test]
fn test_notification_failure_keeps_uri() {
    let f = Fixture::new();
    let tracker = f.db.operation_tracker();
    let (_, op) = f.creating_cluster("c1");

    let op = tracker
        .patch_status(&op, ProvisioningState::Succeeded, None, Some(&Unreachable))
        .unwrap();
    assert_eq!(op.status, ProvisioningState::Succeeded);
    assert!(op.notification_uri.is_some());
}

/// A resource driven by a newer operation is left alone.
#[test]
fn test_superseded_operation_cannot_mirror() {
    let f = Fixture::new();
    let tracker = f.db.operation_tracker();
    let (mut cluster, op) = f.creating_cluster("c1");
    let clusters = f.db.clusters("sub", "rg").unwrap();

    cluster.active_operation_id = Some("someone-else".into());
    clusters.replace(&cluster).unwrap();

    let err = tracker
        .update_status(&op, ProvisioningState::Provisioning, None, None)
        .unwrap_err();
    assert!(err.is_precondition_failed());
    assert_eq!(
        clusters.get(&cluster.id).unwrap().provisioning_state,
        ProvisioningState::Accepted
    );
}

/// A concurrent writer's update wins over a stale operation copy.
#[test]
fn test_stale_operation_copy_is_rejected() {
    let f = Fixture::new();
    let tracker = f.db.operation_tracker();
    let (_, op) = f.creating_cluster("c1");

    tracker
        .patch_status(&op, ProvisioningState::Provisioning, None, None)
        .unwrap();
    let err = tracker
        .patch_status(&op, ProvisioningState::Failed, None, None)
        .unwrap_err();
    assert!(err.is_precondition_failed());
}
