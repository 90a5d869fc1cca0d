#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Flowsync Core
//!
//! Deploys a fixed set of bundled workflow definitions into a remote
//! workflow-automation instance through its REST API, and keeps a local registry
//! synchronized with that instance's true state.
//!
//! ## Overview
//!
//! The crate never executes workflow logic. It discovers the bundled definition
//! files, decides what changed, deploys everything inactive, activates in
//! dependency order, and repairs the registry when the remote side drifts.
//!
//! ## Architecture
//!
//! - **Two-phase deployment**: every definition is created or updated first, all
//!   inactive, and only then activated leaves-first, so no activation can refer to
//!   a definition the remote system has not indexed yet
//! - **Narrow retries**: only "not yet published" activation failures are retried
//!   with exponential backoff; anything else fails that definition immediately
//! - **Best-effort rollback**: a failed Phase 1 deletes what the run created
//! - **Explicit collaborators**: the remote API ([`client::WorkflowApi`]), the
//!   registry ([`registry::RegistryStore`]) and the remote configuration
//!   ([`config::RemoteConfigProvider`]) are injected ports
//!
//! ## Module Organization
//!
//! - [`definitions`] - Bundle loading, checksums and API payloads
//! - [`client`] - Remote workflow API port and reqwest client
//! - [`registry`] - Registry rows and their PostgreSQL / in-memory stores
//! - [`state_machine`] - Import status state machine
//! - [`orchestration`] - Import, activation, rollback, cleanup and reconciliation
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured tracing setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use flowsync_core::config::{ConfigManager, StaticConfigProvider};
//! use flowsync_core::orchestration::{DeploymentEngine, ImportOptions};
//! use flowsync_core::registry::MemoryRegistryStore;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load(None)?;
//! let config = manager.config();
//! let provider = StaticConfigProvider::new(config.remote.clone());
//!
//! let engine = DeploymentEngine::from_provider(
//!     &provider,
//!     Arc::new(MemoryRegistryStore::new()),
//!     config.import.clone(),
//! )
//! .await?;
//!
//! let progress = engine.import(&ImportOptions::default(), &CancellationToken::new()).await?;
//! for failed in &progress.failed_activations {
//!     println!("{} failed to activate: {}", failed.name, failed.error);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod definitions;
pub mod error;
pub mod logging;
pub mod orchestration;
pub mod registry;
pub mod state_machine;

pub use client::{HttpWorkflowClient, RemoteWorkflow, WorkflowApi};
pub use config::{
    ConfigManager, DatabaseConfig, DeployerConfig, ImportSettings, RemoteApiConfig,
    RemoteConfigProvider, RetryPolicyConfig, StaticConfigProvider,
};
pub use definitions::{BundledDefinition, BundledDefinitionLoader, LoadedBundle, WorkflowPayload};
pub use error::{
    DefinitionError, DeployerError, DeployerResult, RegistryError, RemoteApiError,
};
pub use orchestration::{
    CleanupPolicy, DeploymentEngine, ImportOptions, ImportProgress, RunStatus,
    TwoPhaseImportOrchestrator,
};
#[cfg(feature = "postgres")]
pub use registry::PgRegistryStore;
pub use registry::{MemoryRegistryStore, RegistryEntry, RegistryStore};
pub use state_machine::ImportStatus;
