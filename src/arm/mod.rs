//! Resource identity model
//!
//! Parses hierarchical ARM resource paths and derives the storage key and
//! partition key every persisted document is addressed by. Callers never
//! assemble keys by hand; they are always derived from a [`ResourceId`].

mod errors;
mod keys;
mod resource_id;
mod resource_type;

pub use errors::{ArmError, ArmResult};
pub use keys::{PartitionKey, StorageKey, STORAGE_KEY_DELIMITER};
pub use resource_id::ResourceId;
pub use resource_type::{ResourceType, PROVIDER_NAMESPACE, RESOURCES_NAMESPACE};
