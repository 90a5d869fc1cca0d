//! # Phase-1 Rollback
//!
//! Undoes the definitions a failed Phase 1 created during the current run.
//!
//! Rollback is best-effort, not transactional. Each created definition is deleted
//! remotely and its registry row reset to `pending` with the remote id cleared.
//! When a remote delete fails the row keeps its remote id (the object still
//! exists), is reset to `pending` with the delete error recorded, and rollback
//! moves on. Those orphans need manual cleanup or a later reconciliation.
//!
//! Definitions that were merely updated are never touched: they existed before
//! this run.

use std::sync::Arc;
use tracing::{info, warn};

use super::types::{DefinitionOutcome, DefinitionResult, DeployedDefinition};
use crate::client::WorkflowApi;
use crate::constants::messages;
use crate::error::DeployerResult;
use crate::logging::log_import_operation;
use crate::registry::{RegistryEntry, RegistryStore};

pub struct RollbackManager {
    api: Arc<dyn WorkflowApi>,
    registry: Arc<dyn RegistryStore>,
}

impl RollbackManager {
    pub fn new(api: Arc<dyn WorkflowApi>, registry: Arc<dyn RegistryStore>) -> Self {
        Self { api, registry }
    }

    /// Delete every definition in `deployed` that this run created, newest first
    ///
    /// Remote failures are recorded per item; registry failures propagate.
    pub async fn rollback(
        &self,
        deployed: &[DeployedDefinition],
    ) -> DeployerResult<Vec<DefinitionResult>> {
        let created: Vec<&DeployedDefinition> =
            deployed.iter().filter(|d| d.was_created()).collect();
        info!(count = created.len(), "Rolling back definitions created in this run");

        let mut results = Vec::with_capacity(created.len());
        for definition in created.into_iter().rev() {
            results.push(self.rollback_one(definition).await?);
        }
        Ok(results)
    }

    async fn rollback_one(&self, definition: &DeployedDefinition) -> DeployerResult<DefinitionResult> {
        let mut entry = self
            .registry
            .find_by_filename(&definition.filename)
            .await?
            .unwrap_or_else(|| RegistryEntry::new(&definition.filename, &definition.name));

        let delete_result = match self.api.delete_workflow(&definition.remote_id).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        };

        let result = match delete_result {
            Ok(()) => {
                entry.reset_to_pending(messages::ROLLED_BACK, true);
                log_import_operation(
                    "rollback",
                    &definition.filename,
                    Some(&definition.remote_id),
                    "rolled_back",
                    None,
                );
                DefinitionResult::new(
                    &definition.filename,
                    &definition.name,
                    DefinitionOutcome::RolledBack,
                )
            }
            Err(e) => {
                let error = format!("rollback delete failed: {}", e.message());
                warn!(
                    filename = %definition.filename,
                    remote_id = %definition.remote_id,
                    error = %e,
                    "Rollback could not delete remote definition; it is left orphaned"
                );
                entry.remote_id = Some(definition.remote_id.clone());
                entry.reset_to_pending(&error, false);
                DefinitionResult::new(
                    &definition.filename,
                    &definition.name,
                    DefinitionOutcome::RollbackFailed,
                )
                .with_remote_id(Some(definition.remote_id.clone()))
                .with_error(error)
            }
        };

        self.registry.upsert(&entry).await?;
        Ok(result)
    }
}
