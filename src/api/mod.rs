//! Wire resource types
//!
//! The shapes handed to and returned from the engines, plus the resource
//! types they are stored under.

mod operation;
mod resources;
mod state;
mod subscription;

use crate::arm::{ResourceType, PROVIDER_NAMESPACE};

pub use operation::{
    CorrelationData, Operation, OperationProperties, OperationStatus, EXTERNAL_ID_FIELD,
    REQUEST_FIELD, STATUS_FIELD,
};
pub use resources::{
    Cluster, ClusterInternalState, ExternalAuth, NestedInternalState, NodePool,
    ProvisionedResource, ResourceDocument,
};
pub use state::{CloudErrorBody, OperationRequest, ProvisioningState};
pub use subscription::{Subscription, SubscriptionProperties, SubscriptionState};

pub const CLUSTER_TYPE_NAME: &str = "hcpOpenShiftClusters";
pub const NODE_POOL_TYPE_NAME: &str = "nodePools";
pub const EXTERNAL_AUTH_TYPE_NAME: &str = "externalAuths";
pub const OPERATION_STATUS_TYPE_NAME: &str = "hcpOperationStatuses";

/// `Microsoft.RedHatOpenShift/hcpOpenShiftClusters`
pub fn cluster_resource_type() -> ResourceType {
    ResourceType::new(PROVIDER_NAMESPACE, &[CLUSTER_TYPE_NAME])
}

/// `Microsoft.RedHatOpenShift/hcpOpenShiftClusters/nodePools`
pub fn node_pool_resource_type() -> ResourceType {
    cluster_resource_type().child(NODE_POOL_TYPE_NAME)
}

/// `Microsoft.RedHatOpenShift/hcpOpenShiftClusters/externalAuths`
pub fn external_auth_resource_type() -> ResourceType {
    cluster_resource_type().child(EXTERNAL_AUTH_TYPE_NAME)
}

/// `Microsoft.RedHatOpenShift/hcpOperationStatuses`
pub fn operation_status_resource_type() -> ResourceType {
    ResourceType::new(PROVIDER_NAMESPACE, &[OPERATION_STATUS_TYPE_NAME])
}
