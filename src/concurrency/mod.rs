//! Optimistic concurrency control
//!
//! Every write the store accepts assigns a fresh [`ETag`]. A replace must
//! present the ETag from the most recent read or write of that document;
//! a stale one is rejected with `PreconditionFailed`. Nothing here retries:
//! the losing writer re-reads and decides for itself.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{StoreError, StoreResult};

/// Opaque version token assigned by the store on every write
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ETag(String);

impl ETag {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// A fresh token, quoted the way Cosmos DB formats them.
    pub fn generate() -> Self {
        Self(format!("\"{}\"", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Precondition attached to a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCondition {
    /// Write whether or not the document exists
    Upsert,
    /// The document must not exist yet
    Create,
    /// The document must exist; its version is not checked
    Replace,
    /// The document must exist at exactly this version
    IfMatch(ETag),
}

/// Precondition attached to a delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteCondition {
    Unconditional,
    IfMatch(ETag),
}

/// Validate a write against the document's current version (`None` when
/// the document does not exist).
pub fn check_write(
    key: &str,
    current: Option<&ETag>,
    condition: &WriteCondition,
) -> StoreResult<()> {
    match (condition, current) {
        (WriteCondition::Upsert, _) => Ok(()),
        (WriteCondition::Create, None) => Ok(()),
        (WriteCondition::Create, Some(_)) => Err(StoreError::Conflict(key.to_string())),
        (WriteCondition::Replace, Some(_)) => Ok(()),
        (WriteCondition::Replace, None) | (WriteCondition::IfMatch(_), None) => {
            Err(StoreError::NotFound(key.to_string()))
        }
        (WriteCondition::IfMatch(expected), Some(actual)) => {
            if expected == actual {
                Ok(())
            } else {
                Err(StoreError::PreconditionFailed(format!(
                    "{} (expected etag {}, found {})",
                    key, expected, actual
                )))
            }
        }
    }
}

/// Validate a delete against the document's current version.
pub fn check_delete(
    key: &str,
    current: Option<&ETag>,
    condition: &DeleteCondition,
) -> StoreResult<()> {
    let Some(actual) = current else {
        return Err(StoreError::NotFound(key.to_string()));
    };
    match condition {
        DeleteCondition::Unconditional => Ok(()),
        DeleteCondition::IfMatch(expected) if expected == actual => Ok(()),
        DeleteCondition::IfMatch(expected) => Err(StoreError::PreconditionFailed(format!(
            "{} (expected etag {}, found {})",
            key, expected, actual
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_etags_differ() {
        assert_ne!(ETag::generate(), ETag::generate());
    }

    #[test]
    fn test_create_conflicts_with_existing() {
        let current = ETag::generate();
        assert!(check_write("k", None, &WriteCondition::Create).is_ok());
        assert!(matches!(
            check_write("k", Some(&current), &WriteCondition::Create),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn test_if_match_semantics() {
        let t1 = ETag::generate();
        let t2 = ETag::generate();
        assert!(check_write("k", Some(&t1), &WriteCondition::IfMatch(t1.clone())).is_ok());
        assert!(matches!(
            check_write("k", Some(&t2), &WriteCondition::IfMatch(t1.clone())),
            Err(StoreError::PreconditionFailed(_))
        ));
        assert!(matches!(
            check_write("k", None, &WriteCondition::IfMatch(t1)),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_replace_requires_existence_only() {
        let t1 = ETag::generate();
        assert!(check_write("k", Some(&t1), &WriteCondition::Replace).is_ok());
        assert!(check_write("k", None, &WriteCondition::Replace).is_err());
        assert!(check_write("k", None, &WriteCondition::Upsert).is_ok());
    }

    #[test]
    fn test_delete_conditions() {
        let t1 = ETag::generate();
        let t2 = ETag::generate();
        assert!(matches!(
            check_delete("k", None, &DeleteCondition::Unconditional),
            Err(StoreError::NotFound(_))
        ));
        assert!(check_delete("k", Some(&t1), &DeleteCondition::Unconditional).is_ok());
        assert!(check_delete("k", Some(&t1), &DeleteCondition::IfMatch(t1.clone())).is_ok());
        assert!(check_delete("k", Some(&t2), &DeleteCondition::IfMatch(t1)).is_err());
    }
}
