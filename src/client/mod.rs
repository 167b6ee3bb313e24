//! Database client facade
//!
//! [`DbClient`] owns the store handles and hands out engines scoped to a
//! place in the resource hierarchy.

use tracing::debug;

use crate::api::{cluster_resource_type, Cluster, ExternalAuth, NodePool, Subscription};
use crate::arm::{PartitionKey, ResourceId};
use crate::clock::{system_clock, SharedClock};
use crate::config::Config;
use crate::crud::ResourceCrud;
use crate::document::Resource;
use crate::errors::DbResult;
use crate::global::GlobalListers;
use crate::locks::LockClient;
use crate::operations::{OperationCrud, OperationTracker};
use crate::store::{ChangeFeedPage, ChangeFeedRequest, SharedStore};
use crate::transaction::Transaction;
use crate::untyped::UntypedCrud;

#[derive(Clone)]
pub struct DbClient {
    resources: SharedStore,
    locks: Option<LockClient>,
    clock: SharedClock,
    page_size: Option<usize>,
}

impl DbClient {
    pub fn new(resources: SharedStore) -> Self {
        Self {
            resources,
            locks: None,
            clock: system_clock(),
            page_size: None,
        }
    }

    /// Client for `resources` with page size and lock settings from
    /// `config`. Locks are only available when `locks` is given.
    pub fn from_config(
        config: &Config,
        resources: SharedStore,
        locks: Option<SharedStore>,
    ) -> DbResult<Self> {
        let mut client = Self::new(resources);
        client.page_size = config.page_size();
        if let Some(store) = locks {
            let owner = config.lock_owner();
            debug!(container = %config.locks_label(), owner = %owner, "lock client configured");
            client = client.with_lock_store(store, owner, config.lock_ttl_seconds)?;
        }
        Ok(client)
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.locks = self.locks.map(|locks| locks.with_clock(clock.clone()));
        self.clock = clock;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size).filter(|n| *n > 0);
        self
    }

    pub fn with_lock_store(
        mut self,
        store: SharedStore,
        owner: impl Into<String>,
        ttl_seconds: i64,
    ) -> DbResult<Self> {
        let locks = LockClient::new(store, owner, ttl_seconds)?.with_clock(self.clock.clone());
        self.locks = Some(locks);
        Ok(self)
    }

    pub fn store(&self) -> &SharedStore {
        &self.resources
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn subscriptions(&self) -> ResourceCrud<Subscription> {
        self.crud(None)
    }

    pub fn clusters(
        &self,
        subscription_id: &str,
        resource_group: &str,
    ) -> DbResult<ResourceCrud<Cluster>> {
        let parent = ResourceId::resource_group(subscription_id, resource_group)?;
        Ok(self.crud(Some(parent)))
    }

    pub fn node_pools(
        &self,
        subscription_id: &str,
        resource_group: &str,
        cluster: &str,
    ) -> DbResult<ResourceCrud<NodePool>> {
        let parent = self.cluster_id(subscription_id, resource_group, cluster)?;
        Ok(self.crud(Some(parent)))
    }

    pub fn external_auths(
        &self,
        subscription_id: &str,
        resource_group: &str,
        cluster: &str,
    ) -> DbResult<ResourceCrud<ExternalAuth>> {
        let parent = self.cluster_id(subscription_id, resource_group, cluster)?;
        Ok(self.crud(Some(parent)))
    }

    pub fn operations(&self, subscription_id: &str) -> DbResult<OperationCrud> {
        let parent = ResourceId::subscription(subscription_id)?;
        Ok(OperationCrud::from_crud(self.crud(Some(parent))))
    }

    pub fn operation_tracker(&self) -> OperationTracker {
        OperationTracker::new(self.resources.clone(), self.clock.clone())
    }

    pub fn untyped(&self, parent: &ResourceId) -> UntypedCrud {
        let crud = UntypedCrud::new(self.resources.clone(), parent.clone());
        match self.page_size {
            Some(size) => crud.with_page_size(size),
            None => crud,
        }
    }

    /// Cross-partition listings; not for request paths.
    pub fn global_listers(&self) -> GlobalListers {
        let listers = GlobalListers::new(self.resources.clone());
        match self.page_size {
            Some(size) => listers.with_page_size(size),
            None => listers,
        }
    }

    pub fn new_transaction(&self, partition: &PartitionKey) -> Transaction {
        Transaction::new(self.resources.clone(), partition.clone())
    }

    /// `None` unless a lock store was configured.
    pub fn lock_client(&self) -> Option<&LockClient> {
        self.locks.as_ref()
    }

    pub fn resources_change_feed(&self, request: &ChangeFeedRequest) -> DbResult<ChangeFeedPage> {
        Ok(self.resources.change_feed(request)?)
    }

    fn cluster_id(
        &self,
        subscription_id: &str,
        resource_group: &str,
        cluster: &str,
    ) -> DbResult<ResourceId> {
        Ok(ResourceId::resource_group(subscription_id, resource_group)?
            .child(&cluster_resource_type(), cluster)?)
    }

    fn crud<R: Resource>(&self, parent: Option<ResourceId>) -> ResourceCrud<R> {
        let crud = ResourceCrud::new(self.resources.clone(), parent);
        match self.page_size {
            Some(size) => crud.with_page_size(size),
            None => crud,
        }
    }
}
