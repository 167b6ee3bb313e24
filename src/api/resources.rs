//! Provisioned resources: clusters, node pools and external auth configs
//!
//! The wire shape is flat. The stored shape keeps the fields every
//! provisioned resource shares (internal ID, active operation, state, tags)
//! in a common [`ResourceDocument`] and the resource-specific payload under
//! `internalState`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::arm::{ResourceId, ResourceType};
use crate::concurrency::ETag;
use crate::document::{Resource, TypedDocument};
use crate::errors::DbResult;

use super::state::ProvisioningState;
use super::{cluster_resource_type, external_auth_resource_type, node_pool_resource_type};

/// A resource whose lifecycle is driven by async operations.
pub trait ProvisionedResource: Resource {
    fn provisioning_state(&self) -> ProvisioningState;
    fn set_provisioning_state(&mut self, state: ProvisioningState);
    fn active_operation_id(&self) -> Option<&str>;
    fn set_active_operation_id(&mut self, operation_id: Option<String>);
}

/// Stored properties shared by every provisioned resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDocument<S> {
    pub resource_id: ResourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_operation_id: Option<String>,
    #[serde(default)]
    pub provisioning_state: ProvisioningState,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    pub internal_state: S,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInternalState {
    pub location: String,
    #[serde(default)]
    pub properties: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedInternalState {
    #[serde(default)]
    pub properties: Value,
}

/// A hosted control plane cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub id: ResourceId,
    pub location: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub provisioning_state: ProvisioningState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_id: Option<String>,
    #[serde(default)]
    pub properties: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<ETag>,
}

impl Cluster {
    pub fn new(id: ResourceId, location: impl Into<String>) -> Self {
        Self {
            id,
            location: location.into(),
            tags: BTreeMap::new(),
            provisioning_state: ProvisioningState::Accepted,
            active_operation_id: None,
            internal_id: None,
            properties: Value::Object(Default::default()),
            etag: None,
        }
    }
}

impl Resource for Cluster {
    type Properties = ResourceDocument<ClusterInternalState>;

    fn resource_type() -> ResourceType {
        cluster_resource_type()
    }

    fn resource_id(&self) -> &ResourceId {
        &self.id
    }

    fn etag(&self) -> Option<&ETag> {
        self.etag.as_ref()
    }

    fn to_properties(&self) -> DbResult<Self::Properties> {
        Ok(ResourceDocument {
            resource_id: self.id.clone(),
            internal_id: self.internal_id.clone(),
            active_operation_id: self.active_operation_id.clone(),
            provisioning_state: self.provisioning_state,
            tags: self.tags.clone(),
            internal_state: ClusterInternalState {
                location: self.location.clone(),
                properties: self.properties.clone(),
            },
        })
    }

    fn from_stored(doc: TypedDocument<Self::Properties>) -> DbResult<Self> {
        let props = doc.properties;
        Ok(Self {
            id: props.resource_id,
            location: props.internal_state.location,
            tags: props.tags,
            provisioning_state: props.provisioning_state,
            active_operation_id: props.active_operation_id,
            internal_id: props.internal_id,
            properties: props.internal_state.properties,
            etag: doc.etag,
        })
    }
}

impl ProvisionedResource for Cluster {
    fn provisioning_state(&self) -> ProvisioningState {
        self.provisioning_state
    }

    fn set_provisioning_state(&mut self, state: ProvisioningState) {
        self.provisioning_state = state;
    }

    fn active_operation_id(&self) -> Option<&str> {
        self.active_operation_id.as_deref()
    }

    fn set_active_operation_id(&mut self, operation_id: Option<String>) {
        self.active_operation_id = operation_id;
    }
}

/// A pool of worker nodes under a cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePool {
    pub id: ResourceId,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub provisioning_state: ProvisioningState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_id: Option<String>,
    #[serde(default)]
    pub properties: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<ETag>,
}

impl NodePool {
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            tags: BTreeMap::new(),
            provisioning_state: ProvisioningState::Accepted,
            active_operation_id: None,
            internal_id: None,
            properties: Value::Object(Default::default()),
            etag: None,
        }
    }
}

/// An external identity provider configuration under a cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAuth {
    pub id: ResourceId,
    #[serde(default)]
    pub provisioning_state: ProvisioningState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_id: Option<String>,
    #[serde(default)]
    pub properties: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<ETag>,
}

impl ExternalAuth {
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            provisioning_state: ProvisioningState::Accepted,
            active_operation_id: None,
            internal_id: None,
            properties: Value::Object(Default::default()),
            etag: None,
        }
    }
}

impl Resource for NodePool {
    type Properties = ResourceDocument<NestedInternalState>;

    fn resource_type() -> ResourceType {
        node_pool_resource_type()
    }

    fn resource_id(&self) -> &ResourceId {
        &self.id
    }

    fn etag(&self) -> Option<&ETag> {
        self.etag.as_ref()
    }

    fn to_properties(&self) -> DbResult<Self::Properties> {
        Ok(ResourceDocument {
            resource_id: self.id.clone(),
            internal_id: self.internal_id.clone(),
            active_operation_id: self.active_operation_id.clone(),
            provisioning_state: self.provisioning_state,
            tags: self.tags.clone(),
            internal_state: NestedInternalState {
                properties: self.properties.clone(),
            },
        })
    }

    fn from_stored(doc: TypedDocument<Self::Properties>) -> DbResult<Self> {
        let props = doc.properties;
        Ok(Self {
            id: props.resource_id,
            tags: props.tags,
            provisioning_state: props.provisioning_state,
            active_operation_id: props.active_operation_id,
            internal_id: props.internal_id,
            properties: props.internal_state.properties,
            etag: doc.etag,
        })
    }
}

impl ProvisionedResource for NodePool {
    fn provisioning_state(&self) -> ProvisioningState {
        self.provisioning_state
    }

    fn set_provisioning_state(&mut self, state: ProvisioningState) {
        self.provisioning_state = state;
    }

    fn active_operation_id(&self) -> Option<&str> {
        self.active_operation_id.as_deref()
    }

    fn set_active_operation_id(&mut self, operation_id: Option<String>) {
        self.active_operation_id = operation_id;
    }
}

impl Resource for ExternalAuth {
    type Properties = ResourceDocument<NestedInternalState>;

    fn resource_type() -> ResourceType {
        external_auth_resource_type()
    }

    fn resource_id(&self) -> &ResourceId {
        &self.id
    }

    fn etag(&self) -> Option<&ETag> {
        self.etag.as_ref()
    }

    // External auths carry no tags.
    fn to_properties(&self) -> DbResult<Self::Properties> {
        Ok(ResourceDocument {
            resource_id: self.id.clone(),
            internal_id: self.internal_id.clone(),
            active_operation_id: self.active_operation_id.clone(),
            provisioning_state: self.provisioning_state,
            tags: BTreeMap::new(),
            internal_state: NestedInternalState {
                properties: self.properties.clone(),
            },
        })
    }

    fn from_stored(doc: TypedDocument<Self::Properties>) -> DbResult<Self> {
        let props = doc.properties;
        Ok(Self {
            id: props.resource_id,
            provisioning_state: props.provisioning_state,
            active_operation_id: props.active_operation_id,
            internal_id: props.internal_id,
            properties: props.internal_state.properties,
            etag: doc.etag,
        })
    }
}

impl ProvisionedResource for ExternalAuth {
    fn provisioning_state(&self) -> ProvisioningState {
        self.provisioning_state
    }

    fn set_provisioning_state(&mut self, state: ProvisioningState) {
        self.provisioning_state = state;
    }

    fn active_operation_id(&self) -> Option<&str> {
        self.active_operation_id.as_deref()
    }

    fn set_active_operation_id(&mut self, operation_id: Option<String>) {
        self.active_operation_id = operation_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::ETag;
    use crate::document::{decode, encode};
    use crate::store::StoredItem;
    use serde_json::json;

    const CLUSTER: &str =
        "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/c1";

    #[test]
    fn test_cluster_stored_shape() {
        let mut cluster = Cluster::new(ResourceId::parse(CLUSTER).unwrap(), "eastus");
        cluster.internal_id = Some("/api/clusters_mgmt/v1/clusters/abc".into());
        cluster.tags.insert("team".into(), "core".into());

        let body = encode(&cluster).unwrap();
        assert_eq!(body["properties"]["resourceId"], json!(CLUSTER));
        assert_eq!(body["properties"]["provisioningState"], json!("Accepted"));
        assert_eq!(body["properties"]["internalState"]["location"], json!("eastus"));
        assert_eq!(body["properties"]["tags"]["team"], json!("core"));
    }

    #[test]
    fn test_cluster_round_trips_through_storage() {
        let cluster = Cluster::new(ResourceId::parse(CLUSTER).unwrap(), "eastus");
        let etag = ETag::generate();
        let item = StoredItem {
            body: encode(&cluster).unwrap(),
            etag: etag.clone(),
        };
        let back: Cluster = decode(&item).unwrap();
        assert_eq!(back.etag, Some(etag));
        assert_eq!(Cluster { etag: None, ..back }, cluster);
    }

    #[test]
    fn test_encode_rejects_wrong_resource_type() {
        let pool = NodePool::new(ResourceId::parse(CLUSTER).unwrap());
        assert!(encode(&pool).is_err());
    }

    #[test]
    fn test_decode_rejects_other_kinds() {
        let pool_id = ResourceId::parse(&format!("{}/nodePools/np", CLUSTER)).unwrap();
        let item = StoredItem {
            body: encode(&NodePool::new(pool_id)).unwrap(),
            etag: ETag::generate(),
        };
        assert!(decode::<Cluster>(&item).is_err());
        assert!(decode::<NodePool>(&item).is_ok());
    }
}
