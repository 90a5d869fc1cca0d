//! # Deployment Engine
//!
//! Facade wiring the loader, orchestrator, reconciler, recovery and cleanup
//! around one remote API client and one registry store.
//!
//! Every mutating operation takes the engine's [`RunLock`] first, so an import
//! never overlaps a reconciliation, a recovery or a cleanup of the same registry.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use flowsync_core::config::{ImportSettings, RemoteApiConfig};
//! use flowsync_core::client::HttpWorkflowClient;
//! use flowsync_core::orchestration::{DeploymentEngine, ImportOptions};
//! use flowsync_core::registry::MemoryRegistryStore;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let remote = RemoteApiConfig::new("http://localhost:5678", "secret");
//! let client = Arc::new(HttpWorkflowClient::new(remote)?);
//! let engine = DeploymentEngine::new(client, Arc::new(MemoryRegistryStore::new()), ImportSettings::default());
//!
//! engine.bootstrap().await?;
//! let progress = engine.import(&ImportOptions::default(), &CancellationToken::new()).await?;
//! println!("import finished with {:?}", progress.status);
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::cleanup::{CleanupManager, CleanupPolicy, CleanupReport};
use super::import_orchestrator::{ImportOptions, TwoPhaseImportOrchestrator};
use super::reconciler::RegistrySyncReconciler;
use super::recovery::StuckImportRecovery;
use super::run_lock::RunLock;
use super::types::{
    FailedActivation, ImportProgress, NoopObserver, ProgressObserver, RecoveryReport, SyncSummary,
};
use crate::client::{HttpWorkflowClient, WorkflowApi};
use crate::config::{ImportSettings, RemoteConfigProvider};
use crate::constants::api::WEBHOOK_PATH_PREFIX;
use crate::definitions::BundledDefinitionLoader;
use crate::error::DeployerResult;
use crate::registry::{RegistryEntry, RegistryStore};
use crate::state_machine::ImportStatus;

/// One registry row as reported by [`DeploymentEngine::status`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryStatus {
    pub filename: String,
    pub workflow_name: String,
    pub remote_id: Option<String>,
    pub import_status: ImportStatus,
    pub is_active: bool,
    pub last_error: Option<String>,
    pub last_import_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub webhook_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub entries: Vec<EntryStatus>,
    /// Row count for every status, including zero counts
    pub counts: BTreeMap<ImportStatus, usize>,
    /// `None` when the bundle could not be read
    pub credentials_required: Option<usize>,
}

impl StatusReport {
    pub fn count(&self, status: ImportStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }
}

/// `{base}/webhook/{path}` for each trigger path
pub fn webhook_urls(base: &str, trigger_paths: &[String]) -> Vec<String> {
    let base = base.trim_end_matches('/');
    trigger_paths
        .iter()
        .map(|path| format!("{base}/{WEBHOOK_PATH_PREFIX}/{}", path.trim_start_matches('/')))
        .collect()
}

pub struct DeploymentEngine {
    api: Arc<dyn WorkflowApi>,
    registry: Arc<dyn RegistryStore>,
    settings: ImportSettings,
    webhook_base: Option<String>,
    run_lock: RunLock,
    observer: Arc<dyn ProgressObserver>,
}

impl DeploymentEngine {
    pub fn new(
        api: Arc<dyn WorkflowApi>,
        registry: Arc<dyn RegistryStore>,
        settings: ImportSettings,
    ) -> Self {
        Self {
            api,
            registry,
            settings,
            webhook_base: None,
            run_lock: RunLock::new(),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Build an HTTP-backed engine from the injected remote configuration
    pub async fn from_provider(
        provider: &dyn RemoteConfigProvider,
        registry: Arc<dyn RegistryStore>,
        settings: ImportSettings,
    ) -> DeployerResult<Self> {
        let client = HttpWorkflowClient::from_provider(provider).await?;
        let webhook_base = client.config().effective_webhook_base().to_string();
        Ok(Self::new(Arc::new(client), registry, settings).with_webhook_base(webhook_base))
    }

    pub fn with_webhook_base(mut self, base: impl Into<String>) -> Self {
        self.webhook_base = Some(base.into());
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Share a lock with other engines over the same registry
    pub fn with_run_lock(mut self, run_lock: RunLock) -> Self {
        self.run_lock = run_lock;
        self
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    pub fn run_lock(&self) -> &RunLock {
        &self.run_lock
    }

    /// Start-up hook: reset imports left in flight by a previous process
    pub async fn bootstrap(&self) -> DeployerResult<RecoveryReport> {
        let report = self.recover().await?;
        info!(reset = report.reset_count(), table_missing = report.table_missing, "Deployment engine ready");
        Ok(report)
    }

    pub async fn import(
        &self,
        options: &ImportOptions,
        cancel: &CancellationToken,
    ) -> DeployerResult<ImportProgress> {
        let _guard = self.run_lock.try_acquire("import")?;
        let options = ImportOptions {
            force_update: options.force_update,
            cleanup_policy: options.cleanup_policy.or(self.settings.cleanup_policy),
        };
        TwoPhaseImportOrchestrator::new(
            Arc::clone(&self.api),
            Arc::clone(&self.registry),
            &self.settings,
        )
        .with_observer(Arc::clone(&self.observer))
        .run(&options, cancel)
        .await
    }

    pub async fn reconcile(&self) -> DeployerResult<SyncSummary> {
        let _guard = self.run_lock.try_acquire("reconcile")?;
        RegistrySyncReconciler::new(Arc::clone(&self.api), Arc::clone(&self.registry))
            .reconcile()
            .await
    }

    pub async fn recover(&self) -> DeployerResult<RecoveryReport> {
        let _guard = self.run_lock.try_acquire("recover")?;
        StuckImportRecovery::new(Arc::clone(&self.registry))
            .recover()
            .await
    }

    pub async fn cleanup(
        &self,
        failed: &[FailedActivation],
        policy: CleanupPolicy,
    ) -> DeployerResult<CleanupReport> {
        let _guard = self.run_lock.try_acquire("cleanup")?;
        CleanupManager::new(Arc::clone(&self.api), Arc::clone(&self.registry))
            .cleanup(failed, policy)
            .await
    }

    /// Registry snapshot with webhook URLs; read-only, so no run lock
    pub async fn status(&self) -> DeployerResult<StatusReport> {
        let rows = self.registry.list_all().await?;

        let mut counts: BTreeMap<ImportStatus, usize> =
            ImportStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for row in &rows {
            *counts.entry(row.import_status).or_default() += 1;
        }

        let loader = BundledDefinitionLoader::new(
            self.settings.definitions_dir.clone(),
            self.settings.definition_order.clone(),
        );
        let credentials_required = match loader.load().await {
            Ok(bundle) => Some(bundle.credentials_required()),
            Err(e) => {
                warn!(error = %e, "Could not read definition bundle for status report");
                None
            }
        };

        let entries = rows.into_iter().map(|row| self.entry_status(row)).collect();
        Ok(StatusReport {
            entries,
            counts,
            credentials_required,
        })
    }

    fn entry_status(&self, row: RegistryEntry) -> EntryStatus {
        let webhook_urls = match &self.webhook_base {
            Some(base) => webhook_urls(base, &row.trigger_paths),
            None => Vec::new(),
        };
        EntryStatus {
            filename: row.filename,
            workflow_name: row.workflow_name,
            remote_id: row.remote_id,
            import_status: row.import_status,
            is_active: row.is_active,
            last_error: row.last_error,
            last_import_at: row.last_import_at,
            retry_count: row.retry_count,
            webhook_urls,
        }
    }
}
