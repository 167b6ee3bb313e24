//! Subscriptions registered with the resource provider

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::arm::{ArmResult, ResourceId, ResourceType};
use crate::concurrency::ETag;
use crate::document::{Resource, TypedDocument};
use crate::errors::DbResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionState {
    Registered,
    Unregistered,
    Warned,
    Deleted,
    Suspended,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionProperties {
    pub state: SubscriptionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: ResourceId,
    pub state: SubscriptionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<ETag>,
}

impl Subscription {
    pub fn new(subscription_id: &str, state: SubscriptionState) -> ArmResult<Self> {
        Ok(Self {
            id: ResourceId::subscription(subscription_id)?,
            state,
            registration_date: None,
            properties: None,
            etag: None,
        })
    }

    pub fn is_registered(&self) -> bool {
        self.state == SubscriptionState::Registered
    }
}

impl Resource for Subscription {
    type Properties = SubscriptionProperties;

    fn resource_type() -> ResourceType {
        ResourceType::subscriptions()
    }

    fn resource_id(&self) -> &ResourceId {
        &self.id
    }

    fn etag(&self) -> Option<&ETag> {
        self.etag.as_ref()
    }

    fn to_properties(&self) -> DbResult<Self::Properties> {
        Ok(SubscriptionProperties {
            state: self.state,
            registration_date: self.registration_date.clone(),
            properties: self.properties.clone(),
        })
    }

    fn from_stored(doc: TypedDocument<Self::Properties>) -> DbResult<Self> {
        Ok(Self {
            id: doc.resource_id,
            state: doc.properties.state,
            registration_date: doc.properties.registration_date,
            properties: doc.properties.properties,
            etag: doc.etag,
        })
    }
}
