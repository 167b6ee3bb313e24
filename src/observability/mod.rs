//! Observability for store traffic
//!
//! - [`StoreMetrics`]: monotonic counters per store call kind
//! - [`InstrumentedStore`]: a [`DocumentStore`](crate::store::DocumentStore)
//!   decorator that opens a `tracing` span per call and feeds the counters
//!
//! Observability is read-only: it never changes a call's outcome.

mod instrumented;
mod metrics;

pub use instrumented::InstrumentedStore;
pub use metrics::{StoreMetrics, StoreMetricsSnapshot};
