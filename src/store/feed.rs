//! Latest-version change feed

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;

use crate::arm::PartitionKey;

use super::errors::{StoreError, StoreResult};

/// Where a change feed read starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeFeedStart {
    Beginning,
    /// Only changes made after the request
    Now,
    /// Resume from a previous page's continuation
    Continuation(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFeedRequest {
    /// Restrict the feed to one partition
    pub partition: Option<PartitionKey>,
    pub start: ChangeFeedStart,
    pub max_items: Option<usize>,
}

impl ChangeFeedRequest {
    pub fn from_beginning() -> Self {
        Self {
            partition: None,
            start: ChangeFeedStart::Beginning,
            max_items: None,
        }
    }

    pub fn resume(continuation: impl Into<String>) -> Self {
        Self {
            partition: None,
            start: ChangeFeedStart::Continuation(continuation.into()),
            max_items: None,
        }
    }
}

/// Documents changed since the start position, oldest change first. Each
/// document appears once, at its latest version. Deletes are not reported.
#[derive(Debug, Clone, Default)]
pub struct ChangeFeedPage {
    pub documents: Vec<Value>,
    /// Pass back to continue after this page
    pub continuation: String,
}

pub(crate) fn encode_position(lsn: u64) -> String {
    BASE64.encode(format!("lsn:{}", lsn))
}

pub(crate) fn decode_position(token: &str) -> StoreResult<u64> {
    let invalid = || StoreError::InvalidRequest(format!("invalid change feed token: {:?}", token));
    let bytes = BASE64.decode(token).map_err(|_| invalid())?;
    let text = String::from_utf8(bytes).map_err(|_| invalid())?;
    text.strip_prefix("lsn:")
        .and_then(|n| n.parse().ok())
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_tokens() {
        assert_eq!(decode_position(&encode_position(42)).unwrap(), 42);
        assert!(decode_position("garbage").is_err());
        assert!(decode_position(&BASE64.encode("lsn:x")).is_err());
    }
}
