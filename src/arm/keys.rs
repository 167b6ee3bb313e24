//! Storage and partition keys derived from resource identifiers

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::errors::{ArmError, ArmResult};
use super::resource_id::ResourceId;

/// Replaces `/` inside storage keys. `|` separates multiple resource IDs in
/// ARM, so it can never appear inside a single ID.
pub const STORAGE_KEY_DELIMITER: char = '|';

/// The document `id` a resource is stored under: the lowercased resource ID
/// with every `/` replaced by [`STORAGE_KEY_DELIMITER`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn from_resource_id(resource_id: &ResourceId) -> Self {
        Self(
            resource_id
                .as_str()
                .to_ascii_lowercase()
                .replace('/', &STORAGE_KEY_DELIMITER.to_string()),
        )
    }

    /// Accept a key read back from storage. Empty, non-lowercase or
    /// slash-bearing input is rejected rather than normalized.
    pub fn parse(key: &str) -> ArmResult<Self> {
        if key.is_empty() {
            return Err(ArmError::InvalidStorageKey("storage key is empty".into()));
        }
        if key.to_ascii_lowercase() != key {
            return Err(ArmError::InvalidStorageKey(format!(
                "storage key must be lowercase, not: {:?}",
                key
            )));
        }
        if key.contains('/') {
            return Err(ArmError::InvalidStorageKey(format!(
                "storage key must not contain '/': {:?}",
                key
            )));
        }
        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for StorageKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for StorageKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Partition a document lives in: the lowercased subscription ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey(String);

impl PartitionKey {
    /// Partition for a subscription ID (or any other partition value, such
    /// as a lock ID).
    pub fn new(value: &str) -> ArmResult<Self> {
        if value.is_empty() {
            return Err(ArmError::InvalidArgument("partition key is empty".into()));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    pub fn from_resource_id(resource_id: &ResourceId) -> Self {
        Self(resource_id.subscription_id().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for PartitionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PartitionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}
