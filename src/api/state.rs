//! Provisioning states, operation requests and cloud error bodies

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a resource or an async operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProvisioningState {
    #[default]
    Accepted,
    Provisioning,
    Updating,
    Deleting,
    Succeeded,
    Failed,
    Canceled,
}

impl ProvisioningState {
    /// Terminal states are absorbing: nothing transitions out of them.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProvisioningState::Succeeded | ProvisioningState::Failed | ProvisioningState::Canceled
        )
    }

    pub fn terminal_states() -> [ProvisioningState; 3] {
        [
            ProvisioningState::Succeeded,
            ProvisioningState::Failed,
            ProvisioningState::Canceled,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProvisioningState::Accepted => "Accepted",
            ProvisioningState::Provisioning => "Provisioning",
            ProvisioningState::Updating => "Updating",
            ProvisioningState::Deleting => "Deleting",
            ProvisioningState::Succeeded => "Succeeded",
            ProvisioningState::Failed => "Failed",
            ProvisioningState::Canceled => "Canceled",
        }
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of mutation an async operation performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationRequest {
    Create,
    Update,
    Delete,
    /// POST action issuing a break-glass credential
    RequestCredential,
    /// POST action revoking every issued credential
    RevokeCredentials,
}

impl OperationRequest {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationRequest::Create => "Create",
            OperationRequest::Update => "Update",
            OperationRequest::Delete => "Delete",
            OperationRequest::RequestCredential => "RequestCredential",
            OperationRequest::RevokeCredentials => "RevokeCredentials",
        }
    }
}

impl fmt::Display for OperationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OperationRequest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            OperationRequest::Create,
            OperationRequest::Update,
            OperationRequest::Delete,
            OperationRequest::RequestCredential,
            OperationRequest::RevokeCredentials,
        ]
        .into_iter()
        .find(|r| r.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| format!("unknown operation request '{}'", s))
    }
}

/// ARM error response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<CloudErrorBody>,
}

impl CloudErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            target: None,
            details: Vec::new(),
        }
    }
}
