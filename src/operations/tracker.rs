//! Operation status transitions
//!
//! [`OperationTracker`] moves an operation record between provisioning
//! states, posts the ARM async notification once the operation is
//! terminal, and mirrors the new state onto the resource the operation is
//! acting on.

use thiserror::Error;
use tracing::{error, info};

use crate::api::{
    cluster_resource_type, external_auth_resource_type, node_pool_resource_type, CloudErrorBody,
    Cluster, ExternalAuth, NodePool, Operation, OperationRequest, ProvisionedResource,
    ProvisioningState,
};
use crate::arm::ResourceId;
use crate::clock::SharedClock;
use crate::crud::ResourceCrud;
use crate::errors::{DbError, DbResult};
use crate::store::SharedStore;

use super::OperationCrud;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("async notification failed: {0}")]
pub struct NotificationError(pub String);

/// Delivers the terminal status of an operation to its notification URI.
pub trait AsyncNotifier: Send + Sync {
    fn post(&self, operation: &Operation) -> Result<(), NotificationError>;
}

/// Drives operation records through their lifecycle
#[derive(Clone)]
pub struct OperationTracker {
    store: SharedStore,
    clock: SharedClock,
}

impl OperationTracker {
    pub fn new(store: SharedStore, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Write a new status (and optionally an error) to an operation record.
    ///
    /// Returns the record as stored. When nothing changed and no
    /// notification is pending the record is returned untouched.
    pub fn patch_status(
        &self,
        operation: &Operation,
        status: ProvisioningState,
        cloud_error: Option<CloudErrorBody>,
        notifier: Option<&dyn AsyncNotifier>,
    ) -> DbResult<Operation> {
        if operation.status.is_terminal() && status != operation.status {
            return Err(DbError::InvalidArgument(format!(
                "operation '{}' is already {} and cannot move to {}",
                operation.name(),
                operation.status,
                status
            )));
        }
        if !needs_patch(operation, status, cloud_error.as_ref()) {
            return Ok(operation.clone());
        }

        let crud = OperationCrud::new(self.store.clone(), operation.id.subscription_id())?;
        let mut updated = operation.clone();
        updated.last_transition_time = self.clock.now();
        updated.status = status;
        if cloud_error.is_some() {
            updated.error = cloud_error.clone();
        }

        info!(
            operation_id = %operation.id,
            old_status = %operation.status,
            new_status = %status,
            "updating operation status"
        );
        let mut latest = crud.replace(&updated)?;

        let message = transition_message(latest.request, status);
        match &cloud_error {
            Some(e) => error!(
                operation_id = %latest.id,
                cloud_error_code = %e.code,
                cloud_error_message = %e.message,
                "{}",
                message
            ),
            None => info!(operation_id = %latest.id, "{}", message),
        }

        if let (Some(notifier), true) = (notifier, status.is_terminal()) {
            if latest.notification_uri.is_some() {
                match notifier.post(&latest) {
                    Ok(()) => {
                        info!(operation_id = %latest.id, "posted async notification");
                        // The notification must only go out once.
                        let mut cleared = latest.clone();
                        cleared.notification_uri = None;
                        match crud.replace(&cleared) {
                            Ok(op) => latest = op,
                            Err(e) => error!(
                                operation_id = %latest.id,
                                error = %e,
                                "failed to clear notification URI"
                            ),
                        }
                    }
                    Err(e) => error!(
                        operation_id = %latest.id,
                        error = %e,
                        "failed to post async notification"
                    ),
                }
            }
        }

        Ok(latest)
    }

    /// Patch the operation, then mirror the status onto its target
    /// resource.
    ///
    /// The target must still name this operation as its active one
    /// (`PreconditionFailed` otherwise). Terminal states clear the target's
    /// active operation.
    pub fn update_status(
        &self,
        operation: &Operation,
        status: ProvisioningState,
        cloud_error: Option<CloudErrorBody>,
        notifier: Option<&dyn AsyncNotifier>,
    ) -> DbResult<Operation> {
        let updated = self.patch_status(operation, status, cloud_error, notifier)?;

        let Some(external_id) = updated.external_id.clone() else {
            info!(operation_id = %updated.id, "no external ID, skipping update");
            return Ok(updated);
        };
        info!(operation_id = %updated.id, external_id = %external_id, "updating external resource");

        let resource_type = external_id.resource_type();
        if resource_type == &cluster_resource_type() {
            self.mirror::<Cluster>(&external_id, updated.name(), status)?;
        } else if resource_type == &node_pool_resource_type() {
            self.mirror::<NodePool>(&external_id, updated.name(), status)?;
        } else if resource_type == &external_auth_resource_type() {
            self.mirror::<ExternalAuth>(&external_id, updated.name(), status)?;
        } else {
            return Err(DbError::UnknownResourceType(resource_type.to_string()));
        }
        Ok(updated)
    }

    fn mirror<R: ProvisionedResource>(
        &self,
        target: &ResourceId,
        operation_name: &str,
        status: ProvisioningState,
    ) -> DbResult<()> {
        let parent = target.parent().cloned().ok_or_else(|| {
            DbError::InvalidArgument(format!("'{}' has no parent scope", target))
        })?;
        let crud = ResourceCrud::<R>::new(self.store.clone(), Some(parent));
        let mut current = crud.get(target)?;

        if current.active_operation_id() != Some(operation_name) {
            return Err(DbError::PreconditionFailed(format!(
                "'{}' is not driven by operation '{}'",
                target, operation_name
            )));
        }
        if current.provisioning_state() == status && !status.is_terminal() {
            info!(
                resource_id = %target,
                status = %status,
                "no update needed"
            );
            return Ok(());
        }

        current.set_provisioning_state(status);
        if status.is_terminal() {
            current.set_active_operation_id(None);
        }
        info!(
            resource_id = %target,
            active_operation_id = current.active_operation_id().unwrap_or(""),
            new_status = %status,
            "updating resource"
        );
        crud.replace(&current)?;
        Ok(())
    }
}

fn needs_patch(
    operation: &Operation,
    status: ProvisioningState,
    cloud_error: Option<&CloudErrorBody>,
) -> bool {
    let status_changed = operation.status != status;
    let error_changed = cloud_error.is_some() && cloud_error != operation.error.as_ref();
    let needs_notification = operation.notification_uri.is_some() && status.is_terminal();
    status_changed || error_changed || needs_notification
}

fn transition_message(request: OperationRequest, status: ProvisioningState) -> String {
    let text = match (status, request) {
        (ProvisioningState::Succeeded, OperationRequest::Create) => "Resource creation succeeded",
        (ProvisioningState::Succeeded, OperationRequest::Update) => "Resource update succeeded",
        (ProvisioningState::Succeeded, OperationRequest::Delete) => "Resource deletion succeeded",
        (ProvisioningState::Succeeded, OperationRequest::RequestCredential) => {
            "Credential request succeeded"
        }
        (ProvisioningState::Succeeded, OperationRequest::RevokeCredentials) => {
            "Credential revocation succeeded"
        }
        (ProvisioningState::Failed, OperationRequest::Create) => "Resource creation failed",
        (ProvisioningState::Failed, OperationRequest::Update) => "Resource update failed",
        (ProvisioningState::Failed, OperationRequest::Delete) => "Resource deletion failed",
        (ProvisioningState::Failed, OperationRequest::RequestCredential) => {
            "Credential request failed"
        }
        (ProvisioningState::Failed, OperationRequest::RevokeCredentials) => {
            "Credential revocation failed"
        }
        _ => return format!("Updated status to '{}'", status),
    };
    text.to_string()
}
