//! Untyped hierarchical navigation
//!
//! [`UntypedCrud`] walks the resource tree below a parent ID without
//! knowing the payload types. Documents come back as [`TypedDocument`]
//! with raw JSON properties.

use serde_json::Value;
use tracing::debug;

use crate::arm::{PartitionKey, ResourceId, ResourceType, StorageKey};
use crate::concurrency::DeleteCondition;
use crate::crud::{ListOptions, ResourceIter};
use crate::document::TypedDocument;
use crate::errors::{DbError, DbResult};
use crate::store::{
    PageRequest, Predicate, QueryFilter, QueryScope, SharedStore, StoredItem, RESOURCE_ID_FIELD,
};

/// Get, list and delete anything at or below `parent`.
#[derive(Clone)]
pub struct UntypedCrud {
    store: SharedStore,
    parent: ResourceId,
    page_size: Option<usize>,
}

impl UntypedCrud {
    pub fn new(store: SharedStore, parent: ResourceId) -> Self {
        Self {
            store,
            parent,
            page_size: None,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size).filter(|n| *n > 0);
        self
    }

    pub fn parent(&self) -> &ResourceId {
        &self.parent
    }

    /// Read the document for `resource_id`, which must be the scope itself
    /// or below it.
    ///
    /// Documents whose `id` is not derived from their resource ID (fixture
    /// and migrated data) are found by a partition query on `resourceId`.
    pub fn get(&self, resource_id: &ResourceId) -> DbResult<TypedDocument> {
        TypedDocument::from_item(&self.find(resource_id)?)
    }

    /// Direct children of the scope.
    pub fn list(&self, options: &ListOptions) -> DbResult<ResourceIter<TypedDocument>> {
        let depth = self.parent.depth()
            + if self.parent.resource_type().is_resource_group() {
                4
            } else {
                2
            };
        self.list_filtered(Some(depth), options)
    }

    /// Every descendant of the scope, at any depth.
    pub fn list_recursive(&self, options: &ListOptions) -> DbResult<ResourceIter<TypedDocument>> {
        self.list_filtered(None, options)
    }

    /// Navigator scoped one level down, at `{parent}/{type}/{name}`.
    pub fn child(&self, resource_type: &ResourceType, name: &str) -> DbResult<UntypedCrud> {
        Ok(Self {
            store: self.store.clone(),
            parent: self.parent.child(resource_type, name)?,
            page_size: self.page_size,
        })
    }

    /// Delete the document for `resource_id`, by whatever `id` it is
    /// actually stored under.
    pub fn delete(&self, resource_id: &ResourceId) -> DbResult<()> {
        let item = self.find(resource_id)?;
        self.store.delete(
            &PartitionKey::from_resource_id(resource_id),
            &item.key()?,
            DeleteCondition::Unconditional,
        )?;
        debug!(resource_id = %resource_id, "deleted document");
        Ok(())
    }

    fn find(&self, resource_id: &ResourceId) -> DbResult<StoredItem> {
        if !resource_id.is_within(&self.parent) {
            return Err(DbError::InvalidArgument(format!(
                "'{}' is not within '{}'",
                resource_id, self.parent
            )));
        }

        let partition = PartitionKey::from_resource_id(resource_id);
        match self
            .store
            .read(&partition, &StorageKey::from_resource_id(resource_id))
        {
            Ok(item) => return Ok(item),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        debug!(resource_id = %resource_id, "key lookup missed, querying by resourceId");
        let filter = QueryFilter::new().with(Predicate::FieldEquals {
            pointer: RESOURCE_ID_FIELD.to_string(),
            value: Value::String(resource_id.as_str().to_string()),
            ignore_case: true,
        });
        let page = self.store.query(
            QueryScope::Partition(partition),
            &filter,
            &PageRequest {
                max_items: Some(1),
                continuation: None,
            },
        )?;
        page.items
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound(resource_id.to_string()))
    }

    fn list_filtered(
        &self,
        depth: Option<usize>,
        options: &ListOptions,
    ) -> DbResult<ResourceIter<TypedDocument>> {
        let mut filter =
            QueryFilter::new().with(Predicate::ResourceIdPrefix(format!("{}/", self.parent)));
        if let Some(depth) = depth {
            filter.push(Predicate::ResourceIdDepth(depth));
        }
        Ok(ResourceIter::new(
            self.store.clone(),
            QueryScope::Partition(PartitionKey::from_resource_id(&self.parent)),
            filter,
            options,
            self.page_size,
            TypedDocument::<Value>::from_item,
        ))
    }
}
