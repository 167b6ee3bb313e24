//! Cross-partition listings
//!
//! These scan every partition in the container. They exist for background
//! controllers that sweep the whole fleet and must stay off request paths.

use crate::api::{Cluster, ExternalAuth, NodePool, Operation, Subscription};
use crate::crud::{ListOptions, ResourceCrud, ResourceIter};
use crate::document::Resource;
use crate::errors::DbResult;
use crate::operations::ActiveOperationFilter;
use crate::store::{Predicate, SharedStore};

/// Lists one resource kind across all partitions.
pub struct GlobalLister<R: Resource> {
    crud: ResourceCrud<R>,
    predicates: Vec<Predicate>,
}

impl<R: Resource> GlobalLister<R> {
    fn new(crud: ResourceCrud<R>, predicates: Vec<Predicate>) -> Self {
        Self { crud, predicates }
    }

    pub fn list(&self, options: &ListOptions) -> DbResult<ResourceIter<R>> {
        self.crud.list_where(self.predicates.clone(), options)
    }
}

/// Entry point for every cross-partition listing
#[derive(Clone)]
pub struct GlobalListers {
    store: SharedStore,
    page_size: Option<usize>,
}

impl GlobalListers {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            page_size: None,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size).filter(|n| *n > 0);
        self
    }

    pub fn subscriptions(&self) -> GlobalLister<Subscription> {
        self.lister(Vec::new())
    }

    pub fn clusters(&self) -> GlobalLister<Cluster> {
        self.lister(Vec::new())
    }

    pub fn node_pools(&self) -> GlobalLister<NodePool> {
        self.lister(Vec::new())
    }

    pub fn external_auths(&self) -> GlobalLister<ExternalAuth> {
        self.lister(Vec::new())
    }

    pub fn operations(&self) -> GlobalLister<Operation> {
        self.lister(Vec::new())
    }

    /// Operations in any partition that have not reached a terminal state.
    pub fn active_operations(&self) -> GlobalLister<Operation> {
        self.lister(ActiveOperationFilter::default().predicates())
    }

    fn lister<R: Resource>(&self, predicates: Vec<Predicate>) -> GlobalLister<R> {
        let mut crud = ResourceCrud::new(self.store.clone(), None);
        if let Some(size) = self.page_size {
            crud = crud.with_page_size(size);
        }
        GlobalLister::new(crud, predicates)
    }
}
