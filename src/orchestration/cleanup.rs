//! # Failed-Activation Cleanup
//!
//! Deals with definitions whose Phase-2 activation permanently failed, so the
//! remote instance is not left with half-deployed state.
//!
//! - [`CleanupPolicy::Deactivate`] (default): deactivate remotely, tolerating
//!   "already inactive" replies; the row stays `failed` and inactive
//! - [`CleanupPolicy::Delete`]: delete remotely; the row returns to `pending`
//!   with the remote id cleared
//!
//! Items are independent: a failure is recorded in the report and the next item
//! is processed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use super::error_classifier::is_already_inactive_error;
use super::types::FailedActivation;
use crate::client::WorkflowApi;
use crate::constants::messages;
use crate::error::{DeployerResult, RemoteApiError};
use crate::logging::log_import_operation;
use crate::registry::{RegistryEntry, RegistryStore};
use crate::state_machine::ImportStatus;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupPolicy {
    #[default]
    Deactivate,
    Delete,
}

impl fmt::Display for CleanupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupPolicy::Deactivate => write!(f, "deactivate"),
            CleanupPolicy::Delete => write!(f, "delete"),
        }
    }
}

impl FromStr for CleanupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "deactivate" => Ok(CleanupPolicy::Deactivate),
            "delete" => Ok(CleanupPolicy::Delete),
            other => Err(format!("Unknown cleanup policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupItem {
    pub filename: String,
    pub remote_id: String,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub policy: CleanupPolicy,
    pub items: Vec<CleanupItem>,
}

impl CleanupReport {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.success).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded()
    }
}

pub struct CleanupManager {
    api: Arc<dyn WorkflowApi>,
    registry: Arc<dyn RegistryStore>,
}

impl CleanupManager {
    pub fn new(api: Arc<dyn WorkflowApi>, registry: Arc<dyn RegistryStore>) -> Self {
        Self { api, registry }
    }

    /// Apply `policy` to each failed activation
    ///
    /// Remote failures are recorded per item; registry failures propagate.
    pub async fn cleanup(
        &self,
        failed: &[FailedActivation],
        policy: CleanupPolicy,
    ) -> DeployerResult<CleanupReport> {
        info!(count = failed.len(), policy = %policy, "Cleaning up failed activations");

        let mut items = Vec::with_capacity(failed.len());
        for activation in failed {
            let remote = match policy {
                CleanupPolicy::Deactivate => self.deactivate(&activation.remote_id).await,
                CleanupPolicy::Delete => self.delete(&activation.remote_id).await,
            };

            let item = match remote {
                Ok(()) => {
                    self.update_registry(activation, policy).await?;
                    log_import_operation(
                        "cleanup",
                        &activation.filename,
                        Some(&activation.remote_id),
                        &policy.to_string(),
                        None,
                    );
                    CleanupItem {
                        filename: activation.filename.clone(),
                        remote_id: activation.remote_id.clone(),
                        success: true,
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(
                        filename = %activation.filename,
                        remote_id = %activation.remote_id,
                        policy = %policy,
                        error = %e,
                        "Cleanup failed for definition"
                    );
                    CleanupItem {
                        filename: activation.filename.clone(),
                        remote_id: activation.remote_id.clone(),
                        success: false,
                        error: Some(e.message().to_string()),
                    }
                }
            };
            items.push(item);
        }

        Ok(CleanupReport { policy, items })
    }

    async fn deactivate(&self, remote_id: &str) -> Result<(), RemoteApiError> {
        match self.api.deactivate_workflow(remote_id).await {
            Ok(_) => Ok(()),
            Err(e) if is_already_inactive_error(e.message()) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, remote_id: &str) -> Result<(), RemoteApiError> {
        match self.api.delete_workflow(remote_id).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }

    async fn update_registry(
        &self,
        activation: &FailedActivation,
        policy: CleanupPolicy,
    ) -> DeployerResult<()> {
        let mut entry = self
            .registry
            .find_by_filename(&activation.filename)
            .await?
            .unwrap_or_else(|| RegistryEntry::new(&activation.filename, &activation.name));

        match policy {
            CleanupPolicy::Deactivate => {
                let status = entry.import_status;
                if status != ImportStatus::Failed && status.can_transition_to(ImportStatus::Failed) {
                    entry.mark_failed(activation.error.clone())?;
                } else {
                    entry.set_active_flag(false);
                }
            }
            CleanupPolicy::Delete => entry.reset_to_pending(messages::CLEANUP_DELETED, true),
        }

        self.registry.upsert(&entry).await?;
        Ok(())
    }
}
