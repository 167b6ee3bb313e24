//! Persisted document envelope and wire/storage conversion
//!
//! Every resource is stored as a [`TypedDocument`]: a fixed envelope
//! (`id`, `resourceType`, `resourceId`, `partitionKey`, `_etag`, `_ts`)
//! around a resource-specific `properties` payload. Each resource kind
//! implements [`Resource`] once; the engines never convert by hand.

mod registry;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::arm::{PartitionKey, ResourceId, ResourceType, StorageKey};
use crate::concurrency::ETag;
use crate::errors::{DbError, DbResult};
use crate::store::StoredItem;

pub use registry::{decode_any, AnyResource};

/// The persisted envelope. `P` defaults to an untyped JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDocument<P = Value> {
    pub id: StorageKey,
    pub resource_type: ResourceType,
    pub resource_id: ResourceId,
    pub partition_key: PartitionKey,
    pub properties: P,
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<ETag>,
    #[serde(rename = "_ts", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
}

impl<P> TypedDocument<P> {
    /// Envelope for `resource_id`, with keys and type derived from it.
    pub fn new(resource_id: ResourceId, properties: P) -> Self {
        Self {
            id: StorageKey::from_resource_id(&resource_id),
            resource_type: resource_id.resource_type().clone(),
            partition_key: PartitionKey::from_resource_id(&resource_id),
            resource_id,
            properties,
            etag: None,
            timestamp: None,
            ttl: None,
        }
    }
}

impl<P: Serialize> TypedDocument<P> {
    pub fn to_body(&self) -> DbResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl<P: DeserializeOwned> TypedDocument<P> {
    /// Decode a stored item; the store's ETag wins over the body's copy.
    pub fn from_item(item: &StoredItem) -> DbResult<Self> {
        let mut doc: Self = serde_json::from_value(item.body.clone()).map_err(|e| {
            DbError::Serialization(format!(
                "failed to decode document {}: {}",
                item.body.get("id").and_then(Value::as_str).unwrap_or("<no id>"),
                e
            ))
        })?;
        doc.etag = Some(item.etag.clone());
        Ok(doc)
    }
}

/// Conversion between a wire resource and its stored document.
pub trait Resource: Sized + Send + 'static {
    type Properties: Serialize + DeserializeOwned;

    /// The one resource type this kind is stored under
    fn resource_type() -> ResourceType;

    fn resource_id(&self) -> &ResourceId;

    fn etag(&self) -> Option<&ETag>;

    fn to_properties(&self) -> DbResult<Self::Properties>;

    /// Rebuild the wire object; the document's ETag becomes the object's.
    fn from_stored(doc: TypedDocument<Self::Properties>) -> DbResult<Self>;

    fn to_document(&self) -> DbResult<TypedDocument<Self::Properties>> {
        let mut doc = TypedDocument::new(self.resource_id().clone(), self.to_properties()?);
        doc.etag = self.etag().cloned();
        Ok(doc)
    }
}

/// Decode a stored item as `R`, rejecting documents of another type.
pub fn decode<R: Resource>(item: &StoredItem) -> DbResult<R> {
    let doc = TypedDocument::<R::Properties>::from_item(item)?;
    let expected = R::resource_type();
    if doc.resource_type != expected {
        return Err(DbError::Serialization(format!(
            "document {} has resource type '{}', expected '{}'",
            doc.id, doc.resource_type, expected
        )));
    }
    R::from_stored(doc)
}

/// Encode `resource` as a store body.
pub fn encode<R: Resource>(resource: &R) -> DbResult<Value> {
    let resource_type = resource.resource_id().resource_type();
    if *resource_type != R::resource_type() {
        return Err(DbError::InvalidArgument(format!(
            "resource ID '{}' is not of type '{}'",
            resource.resource_id(),
            R::resource_type()
        )));
    }
    resource.to_document()?.to_body()
}
