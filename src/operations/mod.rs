//! Async operation tracking
//!
//! Operation records live in their subscription's partition. Listing the
//! active ones pushes every condition down to the store: terminal statuses
//! are excluded and the optional request and target filters are matched
//! by the query itself, never by post-filtering in memory.

mod tracker;

use std::ops::Deref;

use serde_json::Value;

use crate::api::{
    Operation, OperationRequest, ProvisioningState, EXTERNAL_ID_FIELD, REQUEST_FIELD, STATUS_FIELD,
};
use crate::arm::ResourceId;
use crate::crud::{ListOptions, ResourceCrud, ResourceIter};
use crate::errors::DbResult;
use crate::store::{Predicate, SharedStore};

pub use tracker::{AsyncNotifier, NotificationError, OperationTracker};

/// Narrows an active-operation listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveOperationFilter {
    /// Only operations performing this request
    pub request: Option<OperationRequest>,
    /// Only operations acting on this resource
    pub external_id: Option<ResourceId>,
    /// With `external_id`, also match operations on its descendants
    pub include_nested: bool,
}

impl ActiveOperationFilter {
    pub fn for_request(request: OperationRequest) -> Self {
        Self {
            request: Some(request),
            ..Self::default()
        }
    }

    pub fn for_resource(external_id: ResourceId, include_nested: bool) -> Self {
        Self {
            request: None,
            external_id: Some(external_id),
            include_nested,
        }
    }

    /// The store predicates selecting operations that match this filter.
    pub(crate) fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = vec![Predicate::FieldNotIn {
            pointer: STATUS_FIELD.to_string(),
            values: ProvisioningState::terminal_states()
                .iter()
                .map(|s| Value::String(s.as_str().to_string()))
                .collect(),
        }];

        if let Some(request) = self.request {
            predicates.push(Predicate::FieldEquals {
                pointer: REQUEST_FIELD.to_string(),
                value: Value::String(request.as_str().to_string()),
                ignore_case: false,
            });
        }

        if let Some(external_id) = &self.external_id {
            let exact = Predicate::FieldEquals {
                pointer: EXTERNAL_ID_FIELD.to_string(),
                value: Value::String(external_id.as_str().to_string()),
                ignore_case: true,
            };
            if self.include_nested {
                predicates.push(Predicate::AnyOf(vec![
                    exact,
                    Predicate::FieldStartsWith {
                        pointer: EXTERNAL_ID_FIELD.to_string(),
                        prefix: format!("{}/", external_id),
                        ignore_case: true,
                    },
                ]));
            } else {
                predicates.push(exact);
            }
        }
        predicates
    }
}

/// Operation records of one subscription
///
/// Dereferences to the generic [`ResourceCrud`] for get, create, replace
/// and the transaction helpers.
#[derive(Clone)]
pub struct OperationCrud {
    inner: ResourceCrud<Operation>,
}

impl OperationCrud {
    pub fn new(store: SharedStore, subscription_id: &str) -> DbResult<Self> {
        let parent = ResourceId::subscription(subscription_id)?;
        Ok(Self {
            inner: ResourceCrud::new(store, Some(parent)),
        })
    }

    pub(crate) fn from_crud(inner: ResourceCrud<Operation>) -> Self {
        Self { inner }
    }

    /// Operations that have not reached a terminal state.
    pub fn list_active_operations(
        &self,
        filter: &ActiveOperationFilter,
    ) -> DbResult<ResourceIter<Operation>> {
        self.inner
            .list_where(filter.predicates(), &ListOptions::default())
    }
}

impl Deref for OperationCrud {
    type Target = ResourceCrud<Operation>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
