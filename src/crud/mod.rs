//! Generic resource CRUD
//!
//! [`ResourceCrud`] implements get, list, create, replace and delete for any
//! [`Resource`] kind, scoped under a parent resource. Storage and partition
//! keys are always derived from resource IDs; callers never supply them.
//!
//! Create fails with `Conflict` when the key is taken. Replace requires the
//! ETag from the caller's last read or write and fails with
//! `PreconditionFailed` when it is stale. Delete removes whatever is stored
//! at the key without a version check.

mod iter;

use std::marker::PhantomData;

use tracing::debug;

use crate::arm::{PartitionKey, ResourceId, StorageKey, STORAGE_KEY_DELIMITER};
use crate::concurrency::{DeleteCondition, WriteCondition};
use crate::document::{decode, encode, Resource};
use crate::errors::{DbError, DbResult};
use crate::store::{BatchOperation, Predicate, QueryFilter, QueryScope, SharedStore};
use crate::transaction::{Transaction, TransactionStepDetails};

pub use iter::{ListOptions, ResourceIter, DEFAULT_PAGE_SIZE};

/// CRUD over one resource kind beneath an optional parent.
///
/// Without a parent the engine spans every partition; only subscriptions
/// are addressed that way.
pub struct ResourceCrud<R: Resource> {
    store: SharedStore,
    parent: Option<ResourceId>,
    page_size: Option<usize>,
    _kind: PhantomData<fn() -> R>,
}

impl<R: Resource> Clone for ResourceCrud<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            parent: self.parent.clone(),
            page_size: self.page_size,
            _kind: PhantomData,
        }
    }
}

impl<R: Resource> ResourceCrud<R> {
    pub fn new(store: SharedStore, parent: Option<ResourceId>) -> Self {
        Self {
            store,
            parent,
            page_size: None,
            _kind: PhantomData,
        }
    }

    /// Page size used when listing without a page size hint.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size).filter(|n| *n > 0);
        self
    }

    pub fn parent(&self) -> Option<&ResourceId> {
        self.parent.as_ref()
    }

    /// The partition this engine is confined to, if any.
    pub fn partition_key(&self) -> Option<PartitionKey> {
        self.parent.as_ref().map(PartitionKey::from_resource_id)
    }

    /// ID of the resource called `name` in this scope.
    pub fn make_resource_id(&self, name: &str) -> DbResult<ResourceId> {
        match &self.parent {
            Some(parent) => Ok(parent.child(&R::resource_type(), name)?),
            None if R::resource_type().is_subscription() => Ok(ResourceId::subscription(name)?),
            None => Err(DbError::InvalidArgument(format!(
                "'{}' resources need a parent scope",
                R::resource_type()
            ))),
        }
    }

    pub fn get(&self, resource_id: &ResourceId) -> DbResult<R> {
        self.check_scope(resource_id)?;
        let item = self.store.read(
            &PartitionKey::from_resource_id(resource_id),
            &StorageKey::from_resource_id(resource_id),
        )?;
        decode(&item)
    }

    pub fn get_by_name(&self, name: &str) -> DbResult<R> {
        self.get(&self.make_resource_id(name)?)
    }

    /// Read by storage key. The partition comes from the scope, or from the
    /// key itself when the engine spans partitions.
    pub fn get_by_storage_key(&self, key: &StorageKey) -> DbResult<R> {
        let partition = match self.partition_key() {
            Some(pk) => pk,
            None => partition_from_key(key)?,
        };
        let item = self.store.read(&partition, key)?;
        decode(&item)
    }

    /// Lazily list every resource of this kind beneath the scope.
    pub fn list(&self, options: &ListOptions) -> DbResult<ResourceIter<R>> {
        self.list_where(Vec::new(), options)
    }

    /// List with extra predicates ANDed onto the scope and type filter.
    pub(crate) fn list_where(
        &self,
        predicates: Vec<Predicate>,
        options: &ListOptions,
    ) -> DbResult<ResourceIter<R>> {
        let mut filter = QueryFilter::new();
        if let Some(parent) = &self.parent {
            filter.push(Predicate::ResourceIdPrefix(format!("{}/", parent)));
        }
        filter.push(Predicate::ResourceType(R::resource_type().to_string()));
        for predicate in predicates {
            filter.push(predicate);
        }

        let scope = match self.partition_key() {
            Some(pk) => QueryScope::Partition(pk),
            None => QueryScope::CrossPartition,
        };
        Ok(ResourceIter::new(
            self.store.clone(),
            scope,
            filter,
            options,
            self.page_size,
            decode::<R>,
        ))
    }

    /// Store a new resource and return it as persisted, ETag included.
    pub fn create(&self, resource: &R) -> DbResult<R> {
        let resource_id = resource.resource_id();
        self.check_scope(resource_id)?;
        let body = encode(resource)?;
        let item = self.store.write(
            &PartitionKey::from_resource_id(resource_id),
            body,
            WriteCondition::Create,
        )?;
        debug!(resource_id = %resource_id, etag = %item.etag, "created resource");
        decode(&item)
    }

    /// Overwrite a resource, provided its ETag is still current.
    pub fn replace(&self, resource: &R) -> DbResult<R> {
        let resource_id = resource.resource_id();
        self.check_scope(resource_id)?;
        let etag = required_etag(resource)?;
        let body = encode(resource)?;
        let item = self.store.write(
            &PartitionKey::from_resource_id(resource_id),
            body,
            WriteCondition::IfMatch(etag),
        )?;
        debug!(resource_id = %resource_id, etag = %item.etag, "replaced resource");
        decode(&item)
    }

    /// Remove a resource. `NotFound` when nothing is stored at its key.
    pub fn delete(&self, resource_id: &ResourceId) -> DbResult<()> {
        self.check_scope(resource_id)?;
        let partition = PartitionKey::from_resource_id(resource_id);
        let item = self
            .store
            .read(&partition, &StorageKey::from_resource_id(resource_id))?;
        self.store
            .delete(&partition, &item.key()?, DeleteCondition::Unconditional)?;
        debug!(resource_id = %resource_id, "deleted resource");
        Ok(())
    }

    /// Queue a create in `transaction`; returns the key it will be stored at.
    pub fn add_create_to_transaction(
        &self,
        transaction: &mut Transaction,
        resource: &R,
    ) -> DbResult<StorageKey> {
        let resource_id = resource.resource_id();
        self.check_transaction(transaction, resource_id)?;
        let details = TransactionStepDetails::for_resource::<R>("Create", resource_id);
        let key = details.storage_key.clone();
        transaction.add_step(
            details,
            BatchOperation::Create {
                body: encode(resource)?,
            },
        );
        Ok(key)
    }

    /// Queue a replace guarded by the resource's ETag.
    pub fn add_replace_to_transaction(
        &self,
        transaction: &mut Transaction,
        resource: &R,
    ) -> DbResult<StorageKey> {
        let resource_id = resource.resource_id();
        self.check_transaction(transaction, resource_id)?;
        let etag = required_etag(resource)?;
        let details = TransactionStepDetails::for_resource::<R>("Replace", resource_id);
        let key = details.storage_key.clone();
        transaction.add_step(
            details,
            BatchOperation::Replace {
                body: encode(resource)?,
                if_match: Some(etag),
            },
        );
        Ok(key)
    }

    pub fn add_delete_to_transaction(
        &self,
        transaction: &mut Transaction,
        resource_id: &ResourceId,
    ) -> DbResult<StorageKey> {
        self.check_transaction(transaction, resource_id)?;
        let details = TransactionStepDetails::for_resource::<R>("Delete", resource_id);
        let key = details.storage_key.clone();
        transaction.add_step(
            details,
            BatchOperation::Delete {
                key: key.clone(),
                if_match: None,
            },
        );
        Ok(key)
    }

    fn check_scope(&self, resource_id: &ResourceId) -> DbResult<()> {
        if resource_id.resource_type() != &R::resource_type() {
            return Err(DbError::InvalidArgument(format!(
                "resource ID '{}' is not of type '{}'",
                resource_id,
                R::resource_type()
            )));
        }
        let Some(parent) = &self.parent else {
            return Ok(());
        };
        let expected = PartitionKey::from_resource_id(parent);
        let found = PartitionKey::from_resource_id(resource_id);
        if expected != found {
            return Err(DbError::WrongPartition {
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
        if !resource_id.is_descendant_of(parent) {
            return Err(DbError::InvalidArgument(format!(
                "resource ID '{}' is not beneath '{}'",
                resource_id, parent
            )));
        }
        Ok(())
    }

    fn check_transaction(
        &self,
        transaction: &Transaction,
        resource_id: &ResourceId,
    ) -> DbResult<()> {
        self.check_scope(resource_id)?;
        let found = PartitionKey::from_resource_id(resource_id);
        if &found != transaction.partition_key() {
            return Err(DbError::WrongPartition {
                expected: transaction.partition_key().to_string(),
                found: found.to_string(),
            });
        }
        Ok(())
    }
}

fn required_etag<R: Resource>(resource: &R) -> DbResult<crate::concurrency::ETag> {
    resource.etag().cloned().ok_or_else(|| {
        DbError::InvalidArgument(format!(
            "replacing '{}' requires the ETag from its last read",
            resource.resource_id()
        ))
    })
}

/// `|subscriptions|{sub}|...` carries its partition as the second segment.
fn partition_from_key(key: &StorageKey) -> DbResult<PartitionKey> {
    let mut segments = key.as_str().split(STORAGE_KEY_DELIMITER).skip(1);
    match (segments.next(), segments.next()) {
        (Some("subscriptions"), Some(sub)) if !sub.is_empty() => Ok(PartitionKey::new(sub)?),
        _ => Err(DbError::InvalidArgument(format!(
            "cannot determine the partition of storage key '{}'",
            key
        ))),
    }
}
