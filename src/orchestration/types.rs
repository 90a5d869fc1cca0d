//! # Orchestration Types
//!
//! Run-level aggregates and per-item results shared by the import orchestrator,
//! the cleanup manager, the reconciler and stuck-import recovery.
//!
//! None of these are persisted. [`ImportProgress`] is pushed to a
//! [`ProgressObserver`] after every state change and returned at the end of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::change_detector::ChangeAction;
use super::cleanup::CleanupReport;
use super::error_classifier::ErrorCategory;
use crate::definitions::SkippedDefinition;

/// Stage of an import run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    Loading,
    /// Phase 1: create/update everything, left inactive
    Deploying,
    /// Phase 2: activate in dependency order
    Activating,
    RollingBack,
    CleaningUp,
    Finished,
}

impl fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ImportPhase::Loading => "loading",
            ImportPhase::Deploying => "deploying",
            ImportPhase::Activating => "activating",
            ImportPhase::RollingBack => "rolling_back",
            ImportPhase::CleaningUp => "cleaning_up",
            ImportPhase::Finished => "finished",
        };
        f.write_str(label)
    }
}

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    /// No failures in either phase
    Complete,
    Error,
}

/// What happened to one definition during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionOutcome {
    Created,
    Updated,
    Skipped,
    Activated,
    ActivationFailed,
    DeployFailed,
    RolledBack,
    /// Rollback attempted but the remote delete failed
    RollbackFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionResult {
    pub filename: String,
    pub name: String,
    pub outcome: DefinitionOutcome,
    pub remote_id: Option<String>,
    pub error: Option<String>,
}

impl DefinitionResult {
    pub fn new(filename: &str, name: &str, outcome: DefinitionOutcome) -> Self {
        Self {
            filename: filename.to_string(),
            name: name.to_string(),
            outcome,
            remote_id: None,
            error: None,
        }
    }

    pub fn with_remote_id(mut self, remote_id: Option<String>) -> Self {
        self.remote_id = remote_id;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// A definition whose Phase-2 activation permanently failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedActivation {
    pub filename: String,
    pub name: String,
    pub remote_id: String,
    pub error: String,
    pub category: ErrorCategory,
}

/// A definition Phase 1 created or updated during this run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedDefinition {
    pub filename: String,
    pub name: String,
    pub remote_id: String,
    pub action: ChangeAction,
}

impl DeployedDefinition {
    /// Whether the remote object came into existence during this run
    pub fn was_created(&self) -> bool {
        self.action == ChangeAction::Create
    }
}

/// Run-level progress aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportProgress {
    pub run_id: Uuid,
    /// Items in the current phase
    pub total: usize,
    /// Items finished in the current phase
    pub completed: usize,
    /// Definition currently being processed
    pub current: Option<String>,
    pub phase: ImportPhase,
    pub status: RunStatus,
    pub results: Vec<DefinitionResult>,
    pub failed_activations: Vec<FailedActivation>,
    /// Definitions that reference credentials which must be configured by hand
    pub credentials_required: usize,
    pub skipped_files: Vec<SkippedDefinition>,
    /// Error that aborted the run, if any
    pub error: Option<String>,
    pub cleanup: Option<CleanupReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ImportProgress {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            total: 0,
            completed: 0,
            current: None,
            phase: ImportPhase::Loading,
            status: RunStatus::Running,
            results: Vec::new(),
            failed_activations: Vec::new(),
            credentials_required: 0,
            skipped_files: Vec::new(),
            error: None,
            cleanup: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub(crate) fn enter_phase(&mut self, phase: ImportPhase, total: usize) {
        self.phase = phase;
        self.total = total;
        self.completed = 0;
        self.current = None;
    }

    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Complete
    }

    pub fn results_with(&self, outcome: DefinitionOutcome) -> impl Iterator<Item = &DefinitionResult> {
        self.results.iter().filter(move |r| r.outcome == outcome)
    }

    /// Latest result recorded for `filename`
    pub fn result_for(&self, filename: &str) -> Option<&DefinitionResult> {
        self.results.iter().rev().find(|r| r.filename == filename)
    }
}

impl Default for ImportProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives a snapshot after every state change
///
/// Called synchronously from the run; implementations must be cheap.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: &ImportProgress);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ImportProgress) + Send + Sync,
{
    fn on_progress(&self, progress: &ImportProgress) {
        self(progress)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _progress: &ImportProgress) {}
}

/// Per-entry reconciliation error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemError {
    pub filename: String,
    pub error: String,
}

/// Outcome of registry-vs-remote reconciliation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub checked: usize,
    pub unchanged: usize,
    /// Filenames whose remote object no longer exists
    pub marked_deleted: Vec<String>,
    /// Filenames whose stored active flag was corrected
    pub state_changed: Vec<String>,
    /// Remote reports active for an entry that is not `imported`; left untouched
    pub inconsistent: Vec<String>,
    pub errors: Vec<ItemError>,
}

/// Outcome of stuck-import recovery
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoveryReport {
    /// Filenames reset to `pending`
    pub reset: Vec<String>,
    /// Registry table not provisioned yet
    pub table_missing: bool,
}

impl RecoveryReport {
    pub fn reset_count(&self) -> usize {
        self.reset.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_closure_observer() {
        let seen = AtomicUsize::new(0);
        let observer = |_: &ImportProgress| {
            seen.fetch_add(1, Ordering::SeqCst);
        };
        let progress = ImportProgress::new();
        observer.on_progress(&progress);
        observer.on_progress(&progress);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_result_lookup_prefers_latest() {
        let mut progress = ImportProgress::new();
        progress
            .results
            .push(DefinitionResult::new("a.json", "A", DefinitionOutcome::Created));
        progress
            .results
            .push(DefinitionResult::new("a.json", "A", DefinitionOutcome::RolledBack));

        assert_eq!(
            progress.result_for("a.json").map(|r| r.outcome),
            Some(DefinitionOutcome::RolledBack)
        );
        assert_eq!(progress.results_with(DefinitionOutcome::Created).count(), 1);
    }

    #[test]
    fn test_progress_serializes_snake_case() {
        let json = serde_json::to_value(ImportProgress::new()).unwrap();
        assert_eq!(json["phase"], "loading");
        assert_eq!(json["status"], "running");
    }
}
