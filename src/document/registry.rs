//! Resource type registry
//!
//! The single dispatch point from a stored `resourceType` to the wire type
//! that decodes it.

use serde_json::Value;

use crate::api::{Cluster, ExternalAuth, NodePool, Operation, Subscription};
use crate::arm::{ResourceId, ResourceType};
use crate::errors::{DbError, DbResult};
use crate::store::StoredItem;

use super::{decode, Resource};

/// Any registered resource kind
#[derive(Debug, Clone, PartialEq)]
pub enum AnyResource {
    Subscription(Subscription),
    Cluster(Cluster),
    NodePool(NodePool),
    ExternalAuth(ExternalAuth),
    Operation(Operation),
}

impl AnyResource {
    pub fn resource_id(&self) -> &ResourceId {
        match self {
            AnyResource::Subscription(r) => r.resource_id(),
            AnyResource::Cluster(r) => r.resource_id(),
            AnyResource::NodePool(r) => r.resource_id(),
            AnyResource::ExternalAuth(r) => r.resource_id(),
            AnyResource::Operation(r) => r.resource_id(),
        }
    }

    pub fn resource_type(&self) -> ResourceType {
        match self {
            AnyResource::Subscription(_) => Subscription::resource_type(),
            AnyResource::Cluster(_) => Cluster::resource_type(),
            AnyResource::NodePool(_) => NodePool::resource_type(),
            AnyResource::ExternalAuth(_) => ExternalAuth::resource_type(),
            AnyResource::Operation(_) => Operation::resource_type(),
        }
    }
}

/// Decode a stored item as whichever registered kind its type names.
pub fn decode_any(item: &StoredItem) -> DbResult<AnyResource> {
    let raw = item
        .body
        .get("resourceType")
        .and_then(Value::as_str)
        .ok_or_else(|| DbError::Serialization("stored document has no resourceType".into()))?;
    let resource_type =
        ResourceType::parse(raw).map_err(|_| DbError::UnknownResourceType(raw.to_string()))?;

    if resource_type == Subscription::resource_type() {
        decode(item).map(AnyResource::Subscription)
    } else if resource_type == Cluster::resource_type() {
        decode(item).map(AnyResource::Cluster)
    } else if resource_type == NodePool::resource_type() {
        decode(item).map(AnyResource::NodePool)
    } else if resource_type == ExternalAuth::resource_type() {
        decode(item).map(AnyResource::ExternalAuth)
    } else if resource_type == Operation::resource_type() {
        decode(item).map(AnyResource::Operation)
    } else {
        Err(DbError::UnknownResourceType(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::SubscriptionState;
    use crate::concurrency::ETag;
    use crate::document::encode;
    use serde_json::json;

    #[test]
    fn test_decode_any_dispatches_on_type() {
        let sub = Subscription::new("sub", SubscriptionState::Registered).unwrap();
        let item = StoredItem {
            body: encode(&sub).unwrap(),
            etag: ETag::generate(),
        };
        match decode_any(&item).unwrap() {
            AnyResource::Subscription(s) => assert_eq!(s.id, sub.id),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unmapped_type_is_unknown() {
        let item = StoredItem {
            body: json!({
                "id": "|subscriptions|sub|providers|microsoft.network|widgets|w",
                "resourceType": "Microsoft.Network/widgets",
                "resourceId": "/subscriptions/sub/providers/Microsoft.Network/widgets/w",
                "partitionKey": "sub",
                "properties": {}
            }),
            etag: ETag::generate(),
        };
        assert!(matches!(
            decode_any(&item),
            Err(DbError::UnknownResourceType(t)) if t == "Microsoft.Network/widgets"
        ));
    }
}
