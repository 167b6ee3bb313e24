//! Resource identifier errors

use thiserror::Error;

/// Result type for identifier operations
pub type ArmResult<T> = Result<T, ArmError>;

/// Errors raised while parsing or deriving resource identifiers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArmError {
    #[error("Malformed resource ID '{id}': {reason}")]
    MalformedResourceId { id: String, reason: String },

    #[error("Invalid resource type '{0}'")]
    InvalidResourceType(String),

    #[error("Cannot switch provider namespace from '{from}' to '{to}'")]
    NamespaceSwitch { from: String, to: String },

    #[error("Invalid storage key '{0}'")]
    InvalidStorageKey(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ArmError {
    pub(crate) fn malformed(id: &str, reason: impl Into<String>) -> Self {
        Self::MalformedResourceId {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}
