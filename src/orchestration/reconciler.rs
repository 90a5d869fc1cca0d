//! # Registry Sync Reconciler
//!
//! Repairs drift between the registry and the remote system's observed state.
//!
//! ## Rules
//!
//! For every registry row that carries a remote id:
//!
//! - id missing from the live listing: the definition was deleted externally;
//!   reset the row to `pending` and clear the remote id
//! - remote active flag differs from the stored flag: update the flag only
//! - otherwise: unchanged
//!
//! A remote "active" report for a row that is not `imported` cannot be stored
//! without breaking the registry invariant; such rows are left as they are and
//! listed under [`SyncSummary::inconsistent`].
//!
//! Failing to list the remote definitions aborts reconciliation. Errors on
//! individual rows are recorded and the walk continues.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::types::{ItemError, SyncSummary};
use crate::client::WorkflowApi;
use crate::constants::messages;
use crate::error::DeployerResult;
use crate::logging::log_registry_operation;
use crate::registry::{RegistryEntry, RegistryStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drift {
    None,
    Deleted,
    ActiveFlag,
    Inconsistent,
}

pub struct RegistrySyncReconciler {
    api: Arc<dyn WorkflowApi>,
    registry: Arc<dyn RegistryStore>,
}

impl RegistrySyncReconciler {
    pub fn new(api: Arc<dyn WorkflowApi>, registry: Arc<dyn RegistryStore>) -> Self {
        Self { api, registry }
    }

    pub async fn reconcile(&self) -> DeployerResult<SyncSummary> {
        let remote = self.api.list_workflows().await?;
        let live: HashMap<String, bool> = remote.into_iter().map(|w| (w.id, w.active)).collect();
        debug!(remote_count = live.len(), "Fetched remote definitions for reconciliation");

        let mut summary = SyncSummary::default();
        for entry in self.registry.list_all().await? {
            let Some(remote_id) = entry.remote_id.clone() else {
                continue;
            };
            summary.checked += 1;
            let filename = entry.filename.clone();

            match self.reconcile_entry(entry, live.get(&remote_id).copied()).await {
                Ok(Drift::None) => summary.unchanged += 1,
                Ok(Drift::Deleted) => summary.marked_deleted.push(filename),
                Ok(Drift::ActiveFlag) => summary.state_changed.push(filename),
                Ok(Drift::Inconsistent) => summary.inconsistent.push(filename),
                Err(e) => {
                    warn!(filename = %filename, error = %e, "Reconciliation failed for entry");
                    summary.errors.push(ItemError {
                        filename,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            checked = summary.checked,
            unchanged = summary.unchanged,
            marked_deleted = summary.marked_deleted.len(),
            state_changed = summary.state_changed.len(),
            inconsistent = summary.inconsistent.len(),
            errors = summary.errors.len(),
            "Registry reconciliation finished"
        );
        Ok(summary)
    }

    async fn reconcile_entry(
        &self,
        mut entry: RegistryEntry,
        remote_active: Option<bool>,
    ) -> DeployerResult<Drift> {
        let Some(active) = remote_active else {
            entry.reset_to_pending(messages::DELETED_REMOTELY, true);
            self.registry.upsert(&entry).await?;
            log_registry_operation("reconcile", Some(&entry.filename), "deleted_remotely", None);
            return Ok(Drift::Deleted);
        };

        if active == entry.is_active {
            return Ok(Drift::None);
        }

        if !entry.set_active_flag(active) {
            warn!(
                filename = %entry.filename,
                status = %entry.import_status,
                "Remote reports an active definition whose import never completed"
            );
            return Ok(Drift::Inconsistent);
        }

        self.registry.upsert(&entry).await?;
        let status = if active { "activated_remotely" } else { "deactivated_remotely" };
        log_registry_operation("reconcile", Some(&entry.filename), status, None);
        Ok(Drift::ActiveFlag)
    }
}
