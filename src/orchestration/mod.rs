//! # Orchestration
//!
//! The import, activation and reconciliation engine.
//!
//! ## Architecture
//!
//! A single logical worker drives every run. Definitions are processed strictly
//! sequentially, both within and across phases; parallel activation would
//! reintroduce the "not yet published" race the two-phase protocol exists to
//! avoid.
//!
//! ## Core Components
//!
//! - **DependencyGraphAnalyzer**: cycle detection and dependency-first ordering
//! - **ChangeDetector**: create / update / skip decision per definition
//! - **TwoPhaseImportOrchestrator**: Phase 1 create/update, Phase 2 activation
//! - **ActivationRetryEngine**: backoff retries for publish-lag failures only
//! - **RollbackManager**: undoes a failed Phase 1
//! - **CleanupManager**: deactivates or deletes definitions that failed activation
//! - **RegistrySyncReconciler**: repairs registry drift against the remote listing
//! - **StuckImportRecovery**: resets rows left in flight by a crashed process
//! - **DeploymentEngine**: facade holding the shared [`RunLock`]
//!
//! ```text
//! Loader ──▶ ChangeDetector ─┐
//!        └─▶ GraphAnalyzer ──┴─▶ Orchestrator ──▶ WorkflowApi
//!                                 │  │  │
//!                 RetryEngine ◀───┘  │  └──▶ RegistryStore
//!                 Rollback / Cleanup ◀┘
//! Reconciler ──▶ WorkflowApi + RegistryStore
//! ```

pub mod change_detector;
pub mod cleanup;
pub mod dependency_graph;
pub mod engine;
pub mod error_classifier;
pub mod import_orchestrator;
pub mod reconciler;
pub mod recovery;
pub mod retry;
pub mod rollback;
pub mod run_lock;
pub mod types;

pub use change_detector::{ChangeAction, ChangeDetector};
pub use cleanup::{CleanupItem, CleanupManager, CleanupPolicy, CleanupReport};
pub use dependency_graph::{DependencyGraphAnalyzer, DependencyNode, GraphAnalysis};
pub use engine::{DeploymentEngine, EntryStatus, StatusReport};
pub use error_classifier::{
    classify_activation_error, is_already_inactive_error, is_transient_activation_error,
    ErrorCategory,
};
pub use import_orchestrator::{ImportOptions, TwoPhaseImportOrchestrator};
pub use reconciler::RegistrySyncReconciler;
pub use recovery::StuckImportRecovery;
pub use retry::{retry_with_policy, ActivationOutcome, ActivationRetryEngine, RetryError, RetryPolicy};
pub use rollback::RollbackManager;
pub use run_lock::{RunGuard, RunLock};
pub use types::{
    DefinitionOutcome, DefinitionResult, DeployedDefinition, FailedActivation, ImportPhase,
    ImportProgress, ItemError, NoopObserver, ProgressObserver, RecoveryReport, RunStatus,
    SyncSummary,
};
