//! Tracing and counting decorator for any [`DocumentStore`]

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, debug_span};

use crate::arm::{PartitionKey, StorageKey};
use crate::concurrency::{DeleteCondition, WriteCondition};
use crate::store::{
    BatchItemResult, BatchOperation, ChangeFeedPage, ChangeFeedRequest, DocumentStore,
    PageRequest, QueryFilter, QueryPage, QueryScope, StoreResult, StoredItem,
};

use super::metrics::StoreMetrics;

/// Wraps a store so every call opens a span and bumps [`StoreMetrics`].
pub struct InstrumentedStore<S> {
    inner: S,
    metrics: Arc<StoreMetrics>,
    container: String,
}

impl<S: DocumentStore> InstrumentedStore<S> {
    pub fn new(inner: S) -> Self {
        Self::with_metrics(inner, Arc::new(StoreMetrics::new()))
    }

    /// Share one set of counters between several stores.
    pub fn with_metrics(inner: S, metrics: Arc<StoreMetrics>) -> Self {
        Self {
            inner,
            metrics,
            container: String::new(),
        }
    }

    /// Label every span with the container the store serves.
    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = container.into();
        self
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn metrics(&self) -> &Arc<StoreMetrics> {
        &self.metrics
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn observe<T>(&self, result: StoreResult<T>) -> StoreResult<T> {
        if let Err(e) = &result {
            self.metrics.record_error(e);
            debug!(status = e.status_code(), error = %e, "store call failed");
        }
        result
    }
}

impl<S: DocumentStore> DocumentStore for InstrumentedStore<S> {
    fn read(&self, partition: &PartitionKey, key: &StorageKey) -> StoreResult<StoredItem> {
        let span = debug_span!(
            "store.read",
            container = %self.container,
            partition = %partition,
            key = %key
        );
        let _enter = span.enter();
        self.metrics.increment_reads();
        self.observe(self.inner.read(partition, key))
    }

    fn write(
        &self,
        partition: &PartitionKey,
        body: Value,
        condition: WriteCondition,
    ) -> StoreResult<StoredItem> {
        let span = debug_span!(
            "store.write",
            container = %self.container,
            partition = %partition,
            condition = ?condition
        );
        let _enter = span.enter();
        self.metrics.increment_writes();
        self.observe(self.inner.write(partition, body, condition))
    }

    fn delete(
        &self,
        partition: &PartitionKey,
        key: &StorageKey,
        condition: DeleteCondition,
    ) -> StoreResult<()> {
        let span = debug_span!(
            "store.delete",
            container = %self.container,
            partition = %partition,
            key = %key
        );
        let _enter = span.enter();
        self.metrics.increment_deletes();
        self.observe(self.inner.delete(partition, key, condition))
    }

    fn query(
        &self,
        scope: QueryScope,
        filter: &QueryFilter,
        page: &PageRequest,
    ) -> StoreResult<QueryPage> {
        let span = debug_span!(
            "store.query",
            container = %self.container,
            scope = ?scope,
            max_items = ?page.max_items
        );
        let _enter = span.enter();
        let result = self.observe(self.inner.query(scope, filter, page));
        if let Ok(p) = &result {
            self.metrics.record_query_page(p.items.len() as u64);
            debug!(items = p.items.len(), more = p.continuation.is_some(), "query page");
        }
        result
    }

    fn execute_batch(
        &self,
        partition: &PartitionKey,
        operations: Vec<BatchOperation>,
    ) -> StoreResult<Vec<BatchItemResult>> {
        let span = debug_span!(
            "store.batch",
            container = %self.container,
            partition = %partition,
            steps = operations.len()
        );
        let _enter = span.enter();
        self.metrics.record_batch(operations.len() as u64);
        self.observe(self.inner.execute_batch(partition, operations))
    }

    fn change_feed(&self, request: &ChangeFeedRequest) -> StoreResult<ChangeFeedPage> {
        let span = debug_span!(
            "store.change_feed",
            container = %self.container,
            partition = ?request.partition
        );
        let _enter = span.enter();
        self.metrics.increment_change_feed_reads();
        self.observe(self.inner.change_feed(request))
    }
}
