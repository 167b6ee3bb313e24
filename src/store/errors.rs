//! Document store errors
//!
//! These are the failures a store adapter reports. The engines convert them
//! into [`crate::errors::DbError`] without losing the kind.

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store adapter errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Item already exists: {0}")]
    Conflict(String),

    #[error("Precondition failed for item: {0}")]
    PreconditionFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Transaction step {step} of {total} failed: {source}")]
    BatchStepFailed {
        step: usize,
        total: usize,
        #[source]
        source: Box<StoreError>,
    },

    #[error("Malformed stored item: {0}")]
    Serialization(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// HTTP status the store would have answered with
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::NotFound(_) => 404,
            StoreError::Conflict(_) => 409,
            StoreError::PreconditionFailed(_) => 412,
            StoreError::InvalidRequest(_) => 400,
            StoreError::BatchStepFailed { source, .. } => source.status_code(),
            StoreError::Serialization(_) => 500,
            StoreError::Unavailable(_) => 503,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == 404
    }

    pub fn is_conflict(&self) -> bool {
        self.status_code() == 409
    }

    pub fn is_precondition_failed(&self) -> bool {
        self.status_code() == 412
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
