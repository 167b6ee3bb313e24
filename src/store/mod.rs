//! Document store adapter
//!
//! [`DocumentStore`] is the narrow interface the engines need from a
//! partitioned document container: point reads, conditional writes and
//! deletes, paged queries, single-partition transactional batches and a
//! change feed. [`MemoryStore`] implements the same contract in process and
//! doubles as the fixture loader for tests and the CLI.

mod batch;
mod errors;
mod feed;
mod memory;
mod query;

use std::sync::Arc;

use serde_json::Value;

use crate::arm::{PartitionKey, StorageKey};
use crate::concurrency::{DeleteCondition, ETag, WriteCondition};

pub use batch::{BatchItemResult, BatchOperation};
pub use errors::{StoreError, StoreResult};
pub use feed::{ChangeFeedPage, ChangeFeedRequest, ChangeFeedStart};
pub use memory::MemoryStore;
pub use query::{
    decode_continuation, encode_continuation, PageRequest, Predicate, QueryFilter, QueryPage,
    QueryScope, SqlParameter, SqlQuery, RESOURCE_ID_FIELD, RESOURCE_TYPE_FIELD,
};

/// System property holding the version token
pub const ETAG_FIELD: &str = "_etag";

/// System property holding the last write time, in epoch seconds
pub const TIMESTAMP_FIELD: &str = "_ts";

/// Per-document time to live, in seconds
pub const TTL_FIELD: &str = "ttl";

/// A document as returned by the store, system properties included
#[derive(Debug, Clone, PartialEq)]
pub struct StoredItem {
    pub body: Value,
    pub etag: ETag,
}

impl StoredItem {
    pub fn key(&self) -> StoreResult<StorageKey> {
        document_key(&self.body)
    }
}

/// Read the storage key out of a document body's `id`.
pub fn document_key(body: &Value) -> StoreResult<StorageKey> {
    let id = body
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::InvalidRequest("document has no string 'id'".into()))?;
    StorageKey::parse(id).map_err(|e| StoreError::InvalidRequest(e.to_string()))
}

/// A partitioned document container
pub trait DocumentStore: Send + Sync {
    /// Point read by storage key
    fn read(&self, partition: &PartitionKey, key: &StorageKey) -> StoreResult<StoredItem>;

    /// Write a document; its key is the body's `id`
    fn write(
        &self,
        partition: &PartitionKey,
        body: Value,
        condition: WriteCondition,
    ) -> StoreResult<StoredItem>;

    fn delete(
        &self,
        partition: &PartitionKey,
        key: &StorageKey,
        condition: DeleteCondition,
    ) -> StoreResult<()>;

    /// One page of documents matching `filter`, in storage key order
    fn query(
        &self,
        scope: QueryScope,
        filter: &QueryFilter,
        page: &PageRequest,
    ) -> StoreResult<QueryPage>;

    /// Apply every operation or none of them. A failing operation is
    /// reported as [`StoreError::BatchStepFailed`] with its 1-based position.
    fn execute_batch(
        &self,
        partition: &PartitionKey,
        operations: Vec<BatchOperation>,
    ) -> StoreResult<Vec<BatchItemResult>>;

    /// Latest version of every document changed since the request's start
    fn change_feed(&self, request: &ChangeFeedRequest) -> StoreResult<ChangeFeedPage>;
}

/// Shared handle the engines hold
pub type SharedStore = Arc<dyn DocumentStore>;

impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    fn read(&self, partition: &PartitionKey, key: &StorageKey) -> StoreResult<StoredItem> {
        (**self).read(partition, key)
    }

    fn write(
        &self,
        partition: &PartitionKey,
        body: Value,
        condition: WriteCondition,
    ) -> StoreResult<StoredItem> {
        (**self).write(partition, body, condition)
    }

    fn delete(
        &self,
        partition: &PartitionKey,
        key: &StorageKey,
        condition: DeleteCondition,
    ) -> StoreResult<()> {
        (**self).delete(partition, key, condition)
    }

    fn query(
        &self,
        scope: QueryScope,
        filter: &QueryFilter,
        page: &PageRequest,
    ) -> StoreResult<QueryPage> {
        (**self).query(scope, filter, page)
    }

    fn execute_batch(
        &self,
        partition: &PartitionKey,
        operations: Vec<BatchOperation>,
    ) -> StoreResult<Vec<BatchItemResult>> {
        (**self).execute_batch(partition, operations)
    }

    fn change_feed(&self, request: &ChangeFeedRequest) -> StoreResult<ChangeFeedPage> {
        (**self).change_feed(request)
    }
}
