//! # Two-Phase Import Orchestrator
//!
//! Deploys the bundled definitions and owns every registry status transition of
//! an import run.
//!
//! ## Protocol
//!
//! The remote system refuses to activate a definition that references another
//! definition it has not indexed yet. Creating everything first, inactive, makes
//! every referenced name exist before any activation is attempted.
//!
//! ```text
//! load bundle ──▶ cycle check ──▶ Phase 1 ──────────────▶ Phase 2 ──▶ cleanup?
//!                                 create/update           activate
//!                                 declared order          dependency order
//!                                    │ any failure
//!                                    ▼
//!                                 rollback (created in this run only)
//! ```
//!
//! - **Phase 1** walks the declared order. A definition already present remotely
//!   under the same name is updated, otherwise created. The row moves to
//!   `importing`/`updating` before the call and to `pending_activation` after it.
//!   The first failure aborts the run and rolls back what this run created.
//! - **Phase 2** activates the definitions Phase 1 handled, dependencies first.
//!   A failed activation is recorded and the batch continues.
//!
//! Processing is strictly sequential. A pacing delay follows each Phase-1 call and
//! separates Phase-2 activations.
//!
//! Cancellation during Phase 1 is handled like a Phase-1 failure. During Phase 2
//! it stops further activations and leaves the remaining rows in
//! `pending_activation`.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::change_detector::{ChangeAction, ChangeDetector};
use super::cleanup::{CleanupManager, CleanupPolicy};
use super::dependency_graph::DependencyGraphAnalyzer;
use super::error_classifier::{classify_activation_error, is_already_inactive_error};
use super::retry::{pause, ActivationRetryEngine, RetryPolicy};
use super::rollback::RollbackManager;
use super::types::{
    DefinitionOutcome, DefinitionResult, DeployedDefinition, FailedActivation, ImportPhase,
    ImportProgress, NoopObserver, ProgressObserver, RunStatus,
};
use crate::client::WorkflowApi;
use crate::config::ImportSettings;
use crate::definitions::{BundledDefinition, BundledDefinitionLoader};
use crate::error::{DeployerError, DeployerResult, RemoteApiError};
use crate::logging::log_import_operation;
use crate::registry::{RegistryEntry, RegistryStore};

/// Per-run options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Update definitions even when their checksum is unchanged
    pub force_update: bool,
    /// Run cleanup over failed activations after Phase 2
    pub cleanup_policy: Option<CleanupPolicy>,
}

impl ImportOptions {
    pub fn forced() -> Self {
        Self {
            force_update: true,
            cleanup_policy: None,
        }
    }

    pub fn with_cleanup(mut self, policy: CleanupPolicy) -> Self {
        self.cleanup_policy = Some(policy);
        self
    }
}

/// Why Phase 1 stopped early
enum Abort {
    Failed {
        definition: DefinitionResult,
        message: String,
    },
    Cancelled,
}

pub struct TwoPhaseImportOrchestrator {
    api: Arc<dyn WorkflowApi>,
    registry: Arc<dyn RegistryStore>,
    loader: BundledDefinitionLoader,
    analyzer: DependencyGraphAnalyzer,
    retry_engine: ActivationRetryEngine,
    rollback: RollbackManager,
    cleanup: CleanupManager,
    phase1_delay: Duration,
    phase2_delay: Duration,
    observer: Arc<dyn ProgressObserver>,
}

impl TwoPhaseImportOrchestrator {
    pub fn new(
        api: Arc<dyn WorkflowApi>,
        registry: Arc<dyn RegistryStore>,
        settings: &ImportSettings,
    ) -> Self {
        let loader = BundledDefinitionLoader::new(
            settings.definitions_dir.clone(),
            settings.definition_order.clone(),
        );
        Self {
            retry_engine: ActivationRetryEngine::new(
                Arc::clone(&api),
                RetryPolicy::from(&settings.activation_retry),
            ),
            rollback: RollbackManager::new(Arc::clone(&api), Arc::clone(&registry)),
            cleanup: CleanupManager::new(Arc::clone(&api), Arc::clone(&registry)),
            api,
            registry,
            loader,
            analyzer: DependencyGraphAnalyzer::new(),
            phase1_delay: settings.phase1_delay(),
            phase2_delay: settings.phase2_delay(),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_engine = ActivationRetryEngine::new(Arc::clone(&self.api), policy);
        self
    }

    pub fn with_pacing(mut self, phase1_delay: Duration, phase2_delay: Duration) -> Self {
        self.phase1_delay = phase1_delay;
        self.phase2_delay = phase2_delay;
        self
    }

    pub fn loader(&self) -> &BundledDefinitionLoader {
        &self.loader
    }

    fn notify(&self, progress: &ImportProgress) {
        self.observer.on_progress(progress);
    }

    /// Run a complete import
    ///
    /// Phase failures are reported through the returned progress. `Err` is
    /// returned for a missing bundle directory, a dependency cycle and registry
    /// failures.
    pub async fn run(
        &self,
        options: &ImportOptions,
        cancel: &CancellationToken,
    ) -> DeployerResult<ImportProgress> {
        let mut progress = ImportProgress::new();
        info!(run_id = %progress.run_id, force_update = options.force_update, "Starting import run");
        self.notify(&progress);

        let bundle = self.loader.load().await?;
        progress.credentials_required = bundle.credentials_required();
        progress.skipped_files = bundle.skipped.clone();

        let analysis = self.analyzer.analyze_definitions(&bundle.definitions);
        if analysis.has_cycle {
            warn!(run_id = %progress.run_id, cycles = ?analysis.cycles, "Refusing to import cyclic definitions");
            return Err(DeployerError::DependencyCycle {
                cycles: analysis.cycles,
            });
        }

        let deployed = match self
            .deploy_phase(&bundle.definitions, options, cancel, &mut progress)
            .await?
        {
            Ok(deployed) => deployed,
            Err((deployed, abort)) => {
                self.abort_phase_one(&deployed, abort, &mut progress).await?;
                return Ok(self.finish(progress));
            }
        };

        let activation_order = order_for_activation(&deployed, &analysis.order);
        self.activation_phase(&activation_order, cancel, &mut progress)
            .await?;

        if let Some(policy) = options.cleanup_policy {
            if !progress.failed_activations.is_empty() {
                progress.enter_phase(ImportPhase::CleaningUp, progress.failed_activations.len());
                self.notify(&progress);
                let report = self
                    .cleanup
                    .cleanup(&progress.failed_activations, policy)
                    .await?;
                progress.completed = report.items.len();
                progress.cleanup = Some(report);
            }
        }

        Ok(self.finish(progress))
    }

    /// Phase 1; the inner `Err` carries what was deployed before the abort
    async fn deploy_phase(
        &self,
        definitions: &[BundledDefinition],
        options: &ImportOptions,
        cancel: &CancellationToken,
        progress: &mut ImportProgress,
    ) -> DeployerResult<Result<Vec<DeployedDefinition>, (Vec<DeployedDefinition>, Abort)>> {
        let detector = ChangeDetector::new(options.force_update);
        progress.enter_phase(ImportPhase::Deploying, definitions.len());
        self.notify(progress);

        let mut deployed = Vec::new();
        for definition in definitions {
            if cancel.is_cancelled() {
                return Ok(Err((deployed, Abort::Cancelled)));
            }
            progress.current = Some(definition.name.clone());
            self.notify(progress);

            let entry = self.registry.find_by_filename(&definition.filename).await?;
            let action = detector.detect(definition, entry.as_ref());

            if action == ChangeAction::Skip {
                log_import_operation("deploy", &definition.filename, None, "unchanged", None);
                progress.results.push(
                    DefinitionResult::new(&definition.filename, &definition.name, DefinitionOutcome::Skipped)
                        .with_remote_id(entry.and_then(|e| e.remote_id)),
                );
                progress.completed += 1;
                self.notify(progress);
                continue;
            }

            let entry = entry
                .unwrap_or_else(|| RegistryEntry::new(&definition.filename, &definition.name));
            match self.deploy_one(definition, entry, action).await? {
                Ok(done) => {
                    let outcome = if done.was_created() {
                        DefinitionOutcome::Created
                    } else {
                        DefinitionOutcome::Updated
                    };
                    progress.results.push(
                        DefinitionResult::new(&done.filename, &done.name, outcome)
                            .with_remote_id(Some(done.remote_id.clone())),
                    );
                    progress.completed += 1;
                    deployed.push(done);
                    self.notify(progress);

                    if !pause(self.phase1_delay, cancel).await {
                        return Ok(Err((deployed, Abort::Cancelled)));
                    }
                }
                Err(e) => {
                    let message = e.message().to_string();
                    let result = DefinitionResult::new(
                        &definition.filename,
                        &definition.name,
                        DefinitionOutcome::DeployFailed,
                    )
                    .with_error(message.clone());
                    return Ok(Err((
                        deployed,
                        Abort::Failed {
                            definition: result,
                            message,
                        },
                    )));
                }
            }
        }

        Ok(Ok(deployed))
    }

    /// Create or update one definition; the inner `Err` is the remote failure
    async fn deploy_one(
        &self,
        definition: &BundledDefinition,
        mut entry: RegistryEntry,
        action: ChangeAction,
    ) -> DeployerResult<Result<DeployedDefinition, RemoteApiError>> {
        entry.workflow_name = definition.name.clone();
        entry.begin_import(action == ChangeAction::Update)?;
        let mut entry = self.registry.upsert(&entry).await?;

        let existing = match self.api.find_workflow_by_name(&definition.name).await {
            Ok(found) => found,
            Err(e) => return self.record_deploy_failure(entry, e).await,
        };

        let payload = definition.to_payload();
        let (call, action) = match &existing {
            Some(remote) => {
                if action != ChangeAction::Update {
                    entry.begin_import(true)?;
                    entry = self.registry.upsert(&entry).await?;
                }
                // Phase 1 leaves every deployed definition inactive
                if remote.active {
                    match self.api.deactivate_workflow(&remote.id).await {
                        Ok(_) => {}
                        Err(e) if is_already_inactive_error(e.message()) => {}
                        Err(e) => return self.record_deploy_failure(entry, e).await,
                    }
                }
                (
                    self.api.update_workflow(&remote.id, &payload).await,
                    ChangeAction::Update,
                )
            }
            None => {
                if action != ChangeAction::Create {
                    entry.begin_import(false)?;
                    entry = self.registry.upsert(&entry).await?;
                }
                (self.api.create_workflow(&payload).await, ChangeAction::Create)
            }
        };

        let remote = match call {
            Ok(remote) => remote,
            Err(e) => return self.record_deploy_failure(entry, e).await,
        };
        // some API versions omit the id on update responses
        let remote_id = match (remote.id.is_empty(), existing) {
            (true, Some(found)) => found.id,
            _ => remote.id,
        };

        entry.mark_pending_activation(
            remote_id.clone(),
            definition.checksum.clone(),
            definition.trigger_paths.clone(),
        )?;
        self.registry.upsert(&entry).await?;
        log_import_operation(
            "deploy",
            &definition.filename,
            Some(&remote_id),
            &action.to_string(),
            None,
        );

        Ok(Ok(DeployedDefinition {
            filename: definition.filename.clone(),
            name: definition.name.clone(),
            remote_id,
            action,
        }))
    }

    async fn record_deploy_failure(
        &self,
        mut entry: RegistryEntry,
        error: RemoteApiError,
    ) -> DeployerResult<Result<DeployedDefinition, RemoteApiError>> {
        warn!(filename = %entry.filename, error = %error, "Phase 1 call failed");
        entry.mark_failed(error.message())?;
        self.registry.upsert(&entry).await?;
        Ok(Err(error))
    }

    async fn abort_phase_one(
        &self,
        deployed: &[DeployedDefinition],
        abort: Abort,
        progress: &mut ImportProgress,
    ) -> DeployerResult<()> {
        let message = match abort {
            Abort::Failed {
                definition,
                message,
            } => {
                progress.results.push(definition);
                message
            }
            Abort::Cancelled => "import cancelled during deployment".to_string(),
        };
        warn!(run_id = %progress.run_id, error = %message, "Phase 1 aborted; rolling back");
        progress.error = Some(message);
        progress.status = RunStatus::Error;

        let created = deployed.iter().filter(|d| d.was_created()).count();
        progress.enter_phase(ImportPhase::RollingBack, created);
        self.notify(progress);

        let results = self.rollback.rollback(deployed).await?;
        progress.completed = results.len();
        progress.results.extend(results);
        Ok(())
    }

    async fn activation_phase(
        &self,
        order: &[&DeployedDefinition],
        cancel: &CancellationToken,
        progress: &mut ImportProgress,
    ) -> DeployerResult<()> {
        progress.enter_phase(ImportPhase::Activating, order.len());
        self.notify(progress);

        for (index, definition) in order.iter().enumerate() {
            if cancel.is_cancelled() {
                progress.error = Some("import cancelled during activation".to_string());
                break;
            }
            progress.current = Some(definition.name.clone());
            self.notify(progress);

            let mut entry = self
                .registry
                .find_by_filename(&definition.filename)
                .await?
                .unwrap_or_else(|| RegistryEntry::new(&definition.filename, &definition.name));

            let failure = match self
                .retry_engine
                .activate(&definition.name, &definition.remote_id, cancel)
                .await
            {
                Ok(outcome) if outcome.state.active => {
                    entry.mark_imported()?;
                    self.registry.upsert(&entry).await?;
                    log_import_operation(
                        "activate",
                        &definition.filename,
                        Some(&definition.remote_id),
                        "imported",
                        Some(&format!("attempts={}", outcome.attempts)),
                    );
                    progress.results.push(
                        DefinitionResult::new(&definition.filename, &definition.name, DefinitionOutcome::Activated)
                            .with_remote_id(Some(definition.remote_id.clone())),
                    );
                    None
                }
                Ok(_) => Some("remote reported the definition inactive after activation".to_string()),
                Err(DeployerError::Cancelled(reason)) => {
                    progress.error = Some(format!("import cancelled during activation: {reason}"));
                    break;
                }
                Err(DeployerError::ActivationRejected { message, .. }) => Some(message),
                Err(e) => Some(e.report_message()),
            };

            if let Some(message) = failure {
                let category = classify_activation_error(&message);
                warn!(
                    filename = %definition.filename,
                    remote_id = %definition.remote_id,
                    category = %category,
                    error = %message,
                    "Activation failed; continuing with next definition"
                );
                entry.mark_failed(message.clone())?;
                self.registry.upsert(&entry).await?;
                progress.failed_activations.push(FailedActivation {
                    filename: definition.filename.clone(),
                    name: definition.name.clone(),
                    remote_id: definition.remote_id.clone(),
                    error: message.clone(),
                    category,
                });
                progress.results.push(
                    DefinitionResult::new(
                        &definition.filename,
                        &definition.name,
                        DefinitionOutcome::ActivationFailed,
                    )
                    .with_remote_id(Some(definition.remote_id.clone()))
                    .with_error(message),
                );
            }

            progress.completed += 1;
            self.notify(progress);

            let more = index + 1 < order.len();
            if more && !pause(self.phase2_delay, cancel).await {
                progress.error = Some("import cancelled during activation".to_string());
                break;
            }
        }
        Ok(())
    }

    fn finish(&self, mut progress: ImportProgress) -> ImportProgress {
        if progress.error.is_none() && progress.failed_activations.is_empty() {
            progress.status = RunStatus::Complete;
        } else {
            progress.status = RunStatus::Error;
        }
        progress.phase = ImportPhase::Finished;
        progress.current = None;
        progress.finished_at = Some(chrono::Utc::now());

        info!(
            run_id = %progress.run_id,
            status = ?progress.status,
            results = progress.results.len(),
            failed_activations = progress.failed_activations.len(),
            credentials_required = progress.credentials_required,
            "Import run finished"
        );
        self.notify(&progress);
        progress
    }
}

/// Deployed definitions ordered by the dependency analysis
///
/// Names missing from `order` keep their Phase-1 position at the end.
fn order_for_activation<'a>(
    deployed: &'a [DeployedDefinition],
    order: &[String],
) -> Vec<&'a DeployedDefinition> {
    let mut ordered: Vec<&DeployedDefinition> = order
        .iter()
        .flat_map(|name| deployed.iter().filter(move |d| &d.name == name))
        .collect();
    for definition in deployed {
        if !ordered.iter().any(|d| d.filename == definition.filename) {
            ordered.push(definition);
        }
    }
    ordered
}
