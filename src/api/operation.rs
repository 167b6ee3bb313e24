//! Async operation records
//!
//! Operations live directly under their subscription so they outlive the
//! resource they act on:
//! `/subscriptions/{sub}/providers/Microsoft.RedHatOpenShift/hcpOperationStatuses/{uuid}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::arm::{ResourceId, ResourceType};
use crate::clock::Clock;
use crate::concurrency::ETag;
use crate::document::{Resource, TypedDocument};
use crate::errors::DbResult;

use super::operation_status_resource_type;
use super::state::{CloudErrorBody, OperationRequest, ProvisioningState};

/// JSON pointers into a stored operation, for query push-down
pub const STATUS_FIELD: &str = "/properties/status";
pub const REQUEST_FIELD: &str = "/properties/request";
pub const EXTERNAL_ID_FIELD: &str = "/properties/externalId";

/// Request headers that tie an operation back to the ARM request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationData {
    pub client_request_id: Option<String>,
    pub correlation_request_id: Option<String>,
}

/// Stored operation properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationProperties {
    pub operation_id: ResourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub request: OperationRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<ResourceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_uri: Option<String>,
    pub start_time: DateTime<Utc>,
    pub last_transition_time: DateTime<Utc>,
    pub status: ProvisioningState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CloudErrorBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_request_id: Option<String>,
}

/// One tracked long-running mutation
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub id: ResourceId,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub request: OperationRequest,
    /// The resource the operation acts on
    pub external_id: Option<ResourceId>,
    /// The provisioning backend's handle for the work
    pub internal_id: Option<String>,
    /// Where ARM wants the terminal-state notification posted
    pub notification_uri: Option<String>,
    pub start_time: DateTime<Utc>,
    pub last_transition_time: DateTime<Utc>,
    pub status: ProvisioningState,
    pub error: Option<CloudErrorBody>,
    pub client_request_id: Option<String>,
    pub correlation_request_id: Option<String>,
    pub etag: Option<ETag>,
}

impl Operation {
    /// A freshly accepted operation with a new ID. Delete requests start in
    /// `Deleting` so repeated deletes are turned away while it runs.
    pub fn new(
        request: OperationRequest,
        subscription_id: &str,
        external_id: Option<ResourceId>,
        clock: &dyn Clock,
    ) -> DbResult<Self> {
        let subscription = ResourceId::subscription(subscription_id)?;
        let id =
            subscription.child(&operation_status_resource_type(), &Uuid::new_v4().to_string())?;
        let now = clock.now();
        let status = match request {
            OperationRequest::Delete => ProvisioningState::Deleting,
            _ => ProvisioningState::Accepted,
        };

        Ok(Self {
            id,
            tenant_id: None,
            client_id: None,
            request,
            external_id,
            internal_id: None,
            notification_uri: None,
            start_time: now,
            last_transition_time: now,
            status,
            error: None,
            client_request_id: None,
            correlation_request_id: None,
            etag: None,
        })
    }

    pub fn with_correlation(mut self, correlation: CorrelationData) -> Self {
        self.client_request_id = correlation.client_request_id;
        self.correlation_request_id = correlation.correlation_request_id;
        self
    }

    /// The operation's name, which target resources record as their active
    /// operation.
    pub fn name(&self) -> &str {
        self.id.name()
    }

    /// ARM operation status view. `end_time` is only set once terminal.
    pub fn to_status(&self) -> OperationStatus {
        OperationStatus {
            id: self.id.clone(),
            name: self.id.name().to_string(),
            status: self.status,
            start_time: self.start_time,
            end_time: self
                .status
                .is_terminal()
                .then_some(self.last_transition_time),
            error: self.error.clone(),
        }
    }
}

/// The ARM `Azure-AsyncOperation` response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatus {
    pub id: ResourceId,
    pub name: String,
    pub status: ProvisioningState,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CloudErrorBody>,
}

impl Resource for Operation {
    type Properties = OperationProperties;

    fn resource_type() -> ResourceType {
        operation_status_resource_type()
    }

    fn resource_id(&self) -> &ResourceId {
        &self.id
    }

    fn etag(&self) -> Option<&ETag> {
        self.etag.as_ref()
    }

    fn to_properties(&self) -> DbResult<Self::Properties> {
        Ok(OperationProperties {
            operation_id: self.id.clone(),
            tenant_id: self.tenant_id.clone(),
            client_id: self.client_id.clone(),
            request: self.request,
            external_id: self.external_id.clone(),
            internal_id: self.internal_id.clone(),
            notification_uri: self.notification_uri.clone(),
            start_time: self.start_time,
            last_transition_time: self.last_transition_time,
            status: self.status,
            error: self.error.clone(),
            client_request_id: self.client_request_id.clone(),
            correlation_request_id: self.correlation_request_id.clone(),
        })
    }

    fn from_stored(doc: TypedDocument<Self::Properties>) -> DbResult<Self> {
        let p = doc.properties;
        Ok(Self {
            id: p.operation_id,
            tenant_id: p.tenant_id,
            client_id: p.client_id,
            request: p.request,
            external_id: p.external_id,
            internal_id: p.internal_id,
            notification_uri: p.notification_uri,
            start_time: p.start_time,
            last_transition_time: p.last_transition_time,
            status: p.status,
            error: p.error,
            client_request_id: p.client_request_id,
            correlation_request_id: p.correlation_request_id,
            etag: doc.etag,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::document::encode;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_new_operation_id_lives_under_subscription() {
        let op = Operation::new(OperationRequest::Create, "sub", None, &clock()).unwrap();
        assert_eq!(op.id.subscription_id(), "sub");
        assert_eq!(op.id.resource_type(), &operation_status_resource_type());
        assert!(op.id.resource_group_name().is_none());
        assert_eq!(op.status, ProvisioningState::Accepted);
        assert_eq!(op.start_time, op.last_transition_time);
    }

    #[test]
    fn test_delete_starts_deleting() {
        let op = Operation::new(OperationRequest::Delete, "sub", None, &clock()).unwrap();
        assert_eq!(op.status, ProvisioningState::Deleting);
    }

    #[test]
    fn test_status_end_time_only_when_terminal() {
        let clock = clock();
        let mut op = Operation::new(OperationRequest::Update, "sub", None, &clock).unwrap();
        assert!(op.to_status().end_time.is_none());

        op.status = ProvisioningState::Succeeded;
        op.last_transition_time = clock.now() + Duration::minutes(5);
        let status = op.to_status();
        assert_eq!(status.end_time, Some(op.last_transition_time));
        assert_eq!(status.name, op.name());
    }

    #[test]
    fn test_stored_fields_are_queryable() {
        let target = ResourceId::parse(
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/c",
        )
        .unwrap();
        let op = Operation::new(OperationRequest::Create, "sub", Some(target.clone()), &clock())
            .unwrap();
        let body = encode(&op).unwrap();
        assert_eq!(body.pointer(STATUS_FIELD), Some(&json!("Accepted")));
        assert_eq!(body.pointer(REQUEST_FIELD), Some(&json!("Create")));
        assert_eq!(body.pointer(EXTERNAL_ID_FIELD), Some(&json!(target.as_str())));
    }
}
