//! Store call counters
//!
//! - Counters only, monotonic
//! - Reset only on process start
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::store::StoreError;

/// Counters for every call made through an instrumented store
///
/// Relaxed ordering throughout; readers only need eventually exact values.
#[derive(Debug, Default)]
pub struct StoreMetrics {
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    /// Query round-trips, one per page
    query_pages: AtomicU64,
    /// Documents returned across all query pages
    items_returned: AtomicU64,
    batches: AtomicU64,
    batch_steps: AtomicU64,
    change_feed_reads: AtomicU64,
    not_found: AtomicU64,
    conflicts: AtomicU64,
    precondition_failures: AtomicU64,
    /// Failures other than the three expected outcomes above
    errors: AtomicU64,
}

impl StoreMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_reads(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_writes(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_deletes(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one query page and the documents it carried.
    pub fn record_query_page(&self, items: u64) {
        self.query_pages.fetch_add(1, Ordering::Relaxed);
        self.items_returned.fetch_add(items, Ordering::Relaxed);
    }

    pub fn record_batch(&self, steps: u64) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.batch_steps.fetch_add(steps, Ordering::Relaxed);
    }

    pub fn increment_change_feed_reads(&self) {
        self.change_feed_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Classify a failed call.
    pub fn record_error(&self, error: &StoreError) {
        let counter = match error {
            StoreError::NotFound(_) => &self.not_found,
            StoreError::Conflict(_) => &self.conflicts,
            StoreError::PreconditionFailed(_) => &self.precondition_failures,
            StoreError::BatchStepFailed { source, .. } => return self.record_error(source),
            _ => &self.errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn query_pages(&self) -> u64 {
        self.query_pages.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StoreMetricsSnapshot {
        StoreMetricsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            query_pages: self.query_pages.load(Ordering::Relaxed),
            items_returned: self.items_returned.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            batch_steps: self.batch_steps.load(Ordering::Relaxed),
            change_feed_reads: self.change_feed_reads.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            precondition_failures: self.precondition_failures.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    /// Current values as a JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A point-in-time copy of every counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreMetricsSnapshot {
    pub reads: u64,
    pub writes: u64,
    pub deletes: u64,
    pub query_pages: u64,
    pub items_returned: u64,
    pub batches: u64,
    pub batch_steps: u64,
    pub change_feed_reads: u64,
    pub not_found: u64,
    pub conflicts: u64,
    pub precondition_failures: u64,
    pub errors: u64,
}
