//! Transactional batch operations
//!
//! A batch targets a single partition and commits all-or-nothing.

use serde_json::Value;

use crate::arm::StorageKey;
use crate::concurrency::{DeleteCondition, ETag, WriteCondition};

use super::errors::StoreResult;
use super::{document_key, StoredItem};

/// One mutation inside a batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOperation {
    Create { body: Value },
    Replace { body: Value, if_match: Option<ETag> },
    Upsert { body: Value },
    Delete { key: StorageKey, if_match: Option<ETag> },
}

impl BatchOperation {
    /// Storage key the operation targets
    pub fn key(&self) -> StoreResult<StorageKey> {
        match self {
            BatchOperation::Create { body }
            | BatchOperation::Replace { body, .. }
            | BatchOperation::Upsert { body } => document_key(body),
            BatchOperation::Delete { key, .. } => Ok(key.clone()),
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            BatchOperation::Create { .. } => "Create",
            BatchOperation::Replace { .. } => "Replace",
            BatchOperation::Upsert { .. } => "Upsert",
            BatchOperation::Delete { .. } => "Delete",
        }
    }

    /// The write precondition, or `None` for deletes
    pub fn write_condition(&self) -> Option<WriteCondition> {
        match self {
            BatchOperation::Create { .. } => Some(WriteCondition::Create),
            BatchOperation::Replace {
                if_match: Some(etag),
                ..
            } => Some(WriteCondition::IfMatch(etag.clone())),
            BatchOperation::Replace { if_match: None, .. } => Some(WriteCondition::Replace),
            BatchOperation::Upsert { .. } => Some(WriteCondition::Upsert),
            BatchOperation::Delete { .. } => None,
        }
    }

    pub fn delete_condition(&self) -> Option<DeleteCondition> {
        match self {
            BatchOperation::Delete {
                if_match: Some(etag),
                ..
            } => Some(DeleteCondition::IfMatch(etag.clone())),
            BatchOperation::Delete { if_match: None, .. } => Some(DeleteCondition::Unconditional),
            _ => None,
        }
    }
}

/// Outcome of one committed batch operation
#[derive(Debug, Clone)]
pub struct BatchItemResult {
    pub key: StorageKey,
    pub status_code: u16,
    /// The stored document after a write; `None` after a delete
    pub item: Option<StoredItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_keys_and_conditions() {
        let create = BatchOperation::Create {
            body: json!({ "id": "|subscriptions|s" }),
        };
        assert_eq!(create.key().unwrap().as_str(), "|subscriptions|s");
        assert_eq!(create.write_condition(), Some(WriteCondition::Create));
        assert_eq!(create.delete_condition(), None);

        let etag = ETag::generate();
        let replace = BatchOperation::Replace {
            body: json!({ "id": "|subscriptions|s" }),
            if_match: Some(etag.clone()),
        };
        assert_eq!(replace.write_condition(), Some(WriteCondition::IfMatch(etag)));
    }

    #[test]
    fn test_body_without_id_is_rejected() {
        let op = BatchOperation::Upsert { body: json!({}) };
        assert!(op.key().is_err());
    }
}
