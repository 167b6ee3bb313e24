//! Crate-wide error taxonomy
//!
//! Every engine returns [`DbError`]. Store and identifier errors convert into
//! it without losing their kind, so the HTTP layer can map each variant to
//! its resource-manager status code.

use thiserror::Error;

use crate::arm::ArmError;
use crate::store::StoreError;

/// Result type for engine operations
pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DbError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    Conflict(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Partition mismatch: expected '{expected}', found '{found}'")]
    WrongPartition { expected: String, found: String },

    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Timed out acquiring lock '{0}'")]
    LockTimeout(String),
}

impl DbError {
    /// HTTP status code the API layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            DbError::NotFound(_) => 404,
            DbError::Conflict(_) => 409,
            DbError::PreconditionFailed(_) => 412,
            DbError::InvalidArgument(_) | DbError::WrongPartition { .. } => 400,
            DbError::UnknownResourceType(_) | DbError::Serialization(_) => 500,
            DbError::StoreUnavailable(_) | DbError::LockTimeout(_) => 503,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DbError::Conflict(_))
    }

    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, DbError::PreconditionFailed(_))
    }
}

impl From<StoreError> for DbError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(key) => DbError::NotFound(key),
            StoreError::Conflict(key) => DbError::Conflict(key),
            StoreError::PreconditionFailed(msg) => DbError::PreconditionFailed(msg),
            StoreError::InvalidRequest(msg) => DbError::InvalidArgument(msg),
            StoreError::Serialization(msg) => DbError::Serialization(msg),
            StoreError::Unavailable(msg) => DbError::StoreUnavailable(msg),
            StoreError::BatchStepFailed {
                step,
                total,
                source,
            } => {
                let context = format!("transaction step {} of {} failed", step, total);
                match DbError::from(*source) {
                    DbError::NotFound(m) => DbError::NotFound(format!("{}: {}", context, m)),
                    DbError::Conflict(m) => DbError::Conflict(format!("{}: {}", context, m)),
                    DbError::PreconditionFailed(m) => {
                        DbError::PreconditionFailed(format!("{}: {}", context, m))
                    }
                    DbError::InvalidArgument(m) => {
                        DbError::InvalidArgument(format!("{}: {}", context, m))
                    }
                    DbError::Serialization(m) => {
                        DbError::Serialization(format!("{}: {}", context, m))
                    }
                    DbError::StoreUnavailable(m) => {
                        DbError::StoreUnavailable(format!("{}: {}", context, m))
                    }
                    other => other,
                }
            }
        }
    }
}

impl From<ArmError> for DbError {
    fn from(e: ArmError) -> Self {
        DbError::InvalidArgument(e.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        DbError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(DbError::NotFound("x".into()).status_code(), 404);
        assert_eq!(DbError::Conflict("x".into()).status_code(), 409);
        assert_eq!(DbError::PreconditionFailed("x".into()).status_code(), 412);
        assert_eq!(DbError::InvalidArgument("x".into()).status_code(), 400);
        assert_eq!(DbError::StoreUnavailable("x".into()).status_code(), 503);
    }

    #[test]
    fn test_store_errors_keep_their_kind() {
        assert!(DbError::from(StoreError::NotFound("k".into())).is_not_found());
        assert!(DbError::from(StoreError::Conflict("k".into())).is_conflict());
        assert!(DbError::from(StoreError::PreconditionFailed("k".into())).is_precondition_failed());
        assert!(matches!(
            DbError::from(StoreError::Unavailable("down".into())),
            DbError::StoreUnavailable(_)
        ));
    }

    #[test]
    fn test_batch_failure_carries_step_context() {
        let err = DbError::from(StoreError::BatchStepFailed {
            step: 2,
            total: 3,
            source: Box::new(StoreError::Conflict("k".into())),
        });
        assert!(err.is_conflict());
        assert!(err.to_string().contains("transaction step 2 of 3 failed"));
    }

    #[test]
    fn test_identifier_errors_are_invalid_arguments() {
        let err = DbError::from(ArmError::InvalidStorageKey("".into()));
        assert_eq!(err.status_code(), 400);
    }
}
