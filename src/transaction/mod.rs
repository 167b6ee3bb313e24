//! Transactional batches
//!
//! A [`Transaction`] queues mutations against one partition and commits them
//! in a single store batch: either every step is applied or none is.
//! Post-commit callbacks receive only the committed [`TransactionResult`],
//! never the transaction itself.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use crate::arm::{PartitionKey, ResourceId, StorageKey};
use crate::document::{decode, decode_any, AnyResource, Resource};
use crate::errors::{DbError, DbResult};
use crate::store::{BatchOperation, SharedStore, StoredItem};

type Callback = Box<dyn FnOnce(&TransactionResult) + Send>;

/// What a queued step does, for logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStepDetails {
    pub action_type: String,
    pub storage_key: StorageKey,
    pub resource_id: ResourceId,
    pub type_name: String,
}

impl TransactionStepDetails {
    pub fn for_resource<R: Resource>(action: &str, resource_id: &ResourceId) -> Self {
        Self {
            action_type: action.to_string(),
            storage_key: StorageKey::from_resource_id(resource_id),
            resource_id: resource_id.clone(),
            type_name: std::any::type_name::<R>().to_string(),
        }
    }
}

/// A batch of mutations against a single partition
pub struct Transaction {
    store: SharedStore,
    partition: PartitionKey,
    steps: Vec<(TransactionStepDetails, BatchOperation)>,
    callbacks: Vec<Callback>,
}

impl Transaction {
    pub fn new(store: SharedStore, partition: PartitionKey) -> Self {
        Self {
            store,
            partition,
            steps: Vec::new(),
            callbacks: Vec::new(),
        }
    }

    pub fn partition_key(&self) -> &PartitionKey {
        &self.partition
    }

    /// Queue a mutation. Nothing reaches the store until [`execute`].
    ///
    /// [`execute`]: Transaction::execute
    pub fn add_step(&mut self, details: TransactionStepDetails, operation: BatchOperation) {
        self.steps.push((details, operation));
    }

    /// Register a callback to run once after a successful commit.
    /// Callbacks run in registration order.
    pub fn on_success<F>(&mut self, callback: F)
    where
        F: FnOnce(&TransactionResult) + Send + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    pub fn steps(&self) -> impl Iterator<Item = &TransactionStepDetails> {
        self.steps.iter().map(|(details, _)| details)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Commit every queued step atomically, then run the callbacks.
    ///
    /// A transaction without steps commits nothing and still succeeds.
    pub fn execute(self) -> DbResult<TransactionResult> {
        info!(transaction = %self, "executing transaction");

        let mut result = TransactionResult::default();
        if !self.steps.is_empty() {
            let operations: Vec<BatchOperation> =
                self.steps.into_iter().map(|(_, op)| op).collect();
            let outcomes = self
                .store
                .execute_batch(&self.partition, operations)
                .map_err(|e| {
                    warn!(partition = %self.partition, error = %e, "transaction failed");
                    DbError::from(e)
                })?;

            for outcome in outcomes {
                if let Some(item) = outcome.item {
                    result.items.insert(outcome.key, item);
                }
            }
        }

        for callback in self.callbacks {
            callback(&result);
        }
        Ok(result)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionDetails<'a> {
    partition_key: &'a PartitionKey,
    steps: Vec<&'a TransactionStepDetails>,
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let details = TransactionDetails {
            partition_key: &self.partition,
            steps: self.steps().collect(),
        };
        match serde_json::to_string(&details) {
            Ok(json) => f.write_str(&json),
            Err(e) => write!(f, "failed to marshal transaction details: {}", e),
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("partition", &self.partition)
            .field("steps", &self.steps.len())
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

/// Documents written by a committed transaction, by storage key
#[derive(Debug, Clone, Default)]
pub struct TransactionResult {
    items: BTreeMap<StorageKey, StoredItem>,
}

impl TransactionResult {
    /// The committed resource at `key`, decoded as whatever kind it is.
    pub fn get_item(&self, key: &StorageKey) -> DbResult<AnyResource> {
        decode_any(self.item(key)?)
    }

    /// The committed resource at `key`, decoded as `R`.
    pub fn get_item_as<R: Resource>(&self, key: &StorageKey) -> DbResult<R> {
        decode(self.item(key)?)
    }

    pub fn storage_keys(&self) -> impl Iterator<Item = &StorageKey> {
        self.items.keys()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn item(&self, key: &StorageKey) -> DbResult<&StoredItem> {
        self.items
            .get(key)
            .ok_or_else(|| DbError::NotFound(format!("item {} not in transaction result", key)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;
    use crate::api::{Subscription, SubscriptionState};
    use crate::document::encode;
    use crate::store::{DocumentStore, MemoryStore};

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new())
    }

    fn subscription_step(id: &str) -> (TransactionStepDetails, BatchOperation) {
        let sub = Subscription::new(id, SubscriptionState::Registered).unwrap();
        (
            TransactionStepDetails::for_resource::<Subscription>("Create", &sub.id),
            BatchOperation::Create {
                body: encode(&sub).unwrap(),
            },
        )
    }

    #[test]
    fn test_empty_transaction_succeeds_and_runs_callbacks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut tx = Transaction::new(store(), PartitionKey::new("s").unwrap());
        let counter = calls.clone();
        tx.on_success(move |result| {
            assert!(result.is_empty());
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tx.execute().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callbacks_run_in_order_after_commit() {
        let store = store();
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut tx = Transaction::new(store.clone(), PartitionKey::new("s").unwrap());
        let (details, op) = subscription_step("s");
        tx.add_step(details, op);

        for n in 1..=3 {
            let order = order.clone();
            let reader = store.clone();
            tx.on_success(move |result| {
                // The commit is visible by the time callbacks run.
                let key = result.storage_keys().next().unwrap().clone();
                assert!(reader.read(&PartitionKey::new("s").unwrap(), &key).is_ok());
                order.lock().unwrap().push(n);
            });
        }
        tx.execute().unwrap();
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_failed_transaction_skips_callbacks() {
        let store = store();
        let mut tx = Transaction::new(store.clone(), PartitionKey::new("s").unwrap());
        let (details, op) = subscription_step("s");
        tx.add_step(details.clone(), op.clone());
        tx.add_step(details, op);

        let called = Arc::new(AtomicUsize::new(0));
        let counter = called.clone();
        tx.on_success(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let err = tx.execute().unwrap_err();
        assert!(err.is_conflict());
        assert!(err.to_string().contains("transaction step 2 of 2 failed"));
        assert_eq!(called.load(Ordering::SeqCst), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_result_decodes_items() {
        let mut tx = Transaction::new(store(), PartitionKey::new("s").unwrap());
        let (details, op) = subscription_step("s");
        let key = details.storage_key.clone();
        tx.add_step(details, op);

        let result = tx.execute().unwrap();
        assert!(matches!(result.get_item(&key).unwrap(), AnyResource::Subscription(_)));
        let sub: Subscription = result.get_item_as(&key).unwrap();
        assert!(sub.etag.is_some());

        let missing = StorageKey::parse("|subscriptions|other").unwrap();
        assert!(result.get_item(&missing).unwrap_err().is_not_found());
    }

    #[test]
    fn test_display_renders_steps_as_json() {
        let mut tx = Transaction::new(store(), PartitionKey::new("s").unwrap());
        let (details, op) = subscription_step("s");
        tx.add_step(details, op);

        let rendered: serde_json::Value = serde_json::from_str(&tx.to_string()).unwrap();
        assert_eq!(rendered["partitionKey"], json!("s"));
        assert_eq!(rendered["steps"][0]["actionType"], json!("Create"));
        assert_eq!(rendered["steps"][0]["storageKey"], json!("|subscriptions|s"));
    }
}
