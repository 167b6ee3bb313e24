//! rpdb - resource provider document layer
//!
//! Typed access to resource-manager documents in a partitioned document
//! store: keyed CRUD per resource kind, single-partition transactions,
//! optimistic concurrency through ETags, async operation tracking, untyped
//! navigation, cross-partition listings and lease locks.

pub mod api;
pub mod arm;
pub mod cli;
pub mod client;
pub mod clock;
pub mod concurrency;
pub mod config;
pub mod crud;
pub mod document;
pub mod errors;
pub mod global;
pub mod locks;
pub mod observability;
pub mod operations;
pub mod store;
pub mod transaction;
pub mod untyped;

pub use client::DbClient;
pub use errors::{DbError, DbResult};
