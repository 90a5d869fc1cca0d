//! Stuck-import recovery.
//!
//! `importing` and `updating` only exist while a run in this process is making
//! the corresponding remote call. Found at start-up they are leftovers of a
//! crashed run and are reset to `pending`.

use std::sync::Arc;
use tracing::info;

use super::types::RecoveryReport;
use crate::constants::messages;
use crate::error::{DeployerResult, RegistryError};
use crate::logging::log_registry_operation;
use crate::registry::RegistryStore;
use crate::state_machine::ImportStatus;

pub struct StuckImportRecovery {
    registry: Arc<dyn RegistryStore>,
}

impl StuckImportRecovery {
    pub fn new(registry: Arc<dyn RegistryStore>) -> Self {
        Self { registry }
    }

    /// Reset every in-flight row; a missing registry table counts as none
    pub async fn recover(&self) -> DeployerResult<RecoveryReport> {
        let stuck = match self
            .registry
            .list_by_status(&[ImportStatus::Importing, ImportStatus::Updating])
            .await
        {
            Ok(rows) => rows,
            Err(RegistryError::TableMissing) => {
                info!("Registry table not provisioned yet; nothing to recover");
                return Ok(RecoveryReport {
                    reset: Vec::new(),
                    table_missing: true,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let mut report = RecoveryReport::default();
        for mut entry in stuck {
            let previous = entry.import_status;
            entry.reset_to_pending(messages::STUCK_IMPORT_RESET, false);
            self.registry.upsert(&entry).await?;
            log_registry_operation(
                "recover",
                Some(&entry.filename),
                "reset_to_pending",
                Some(&format!("was {previous}")),
            );
            report.reset.push(entry.filename);
        }

        if !report.reset.is_empty() {
            info!(count = report.reset.len(), "Reset stuck imports to pending");
        }
        Ok(report)
    }
}
