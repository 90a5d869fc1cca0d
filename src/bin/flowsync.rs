//! # Flowsync CLI
//!
//! Operator tool for deploying the bundled definitions and inspecting or
//! repairing the deployment registry. Results are printed as JSON.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use flowsync_core::config::{ConfigManager, StaticConfigProvider};
use flowsync_core::logging::{init_structured_logging, log_error};
use flowsync_core::orchestration::{
    CleanupPolicy, DeploymentEngine, ImportOptions, RecoveryReport,
};
use flowsync_core::registry::PgRegistryStore;

#[derive(Parser, Debug)]
#[command(name = "flowsync")]
#[command(about = "Deploy bundled workflow definitions and reconcile the registry")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path (default: config/flowsync.yaml)
    #[arg(short, long, env = "FLOWSYNC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create/update all bundled definitions, then activate them
    Import {
        /// Update definitions even when unchanged
        #[arg(long)]
        force: bool,

        /// Clean up definitions that fail activation (deactivate or delete)
        #[arg(long)]
        cleanup: Option<CleanupPolicy>,
    },

    /// Reconcile the registry against the remote instance
    Sync,

    /// Reset imports left in flight by a crashed run
    Recover,

    /// Show registry status and webhook URLs
    Status,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Import { .. } => "import",
            Commands::Sync => "sync",
            Commands::Recover => "recover",
            Commands::Status => "status",
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_structured_logging();

    let manager = ConfigManager::load(cli.config.as_deref()).context("loading configuration")?;
    let config = manager.config();
    info!(
        source = ?manager.source_file(),
        definitions_dir = %config.import.definitions_dir.display(),
        "Flowsync starting"
    );

    let store = PgRegistryStore::connect(&config.database)
        .await
        .context("connecting registry database")?;
    store.migrate().await.context("migrating registry database")?;

    let provider = StaticConfigProvider::new(config.remote.clone());
    let engine = DeploymentEngine::from_provider(&provider, Arc::new(store), config.import.clone())
        .await
        .context("building deployment engine")?;

    let recovered = engine.bootstrap().await?;

    let operation = cli.command.name();
    if let Err(e) = run(&engine, cli.command, recovered).await {
        log_error("cli", operation, &format!("{e:#}"), None);
        return Err(e);
    }
    Ok(())
}

async fn run(
    engine: &DeploymentEngine,
    command: Commands,
    recovered: RecoveryReport,
) -> anyhow::Result<()> {
    match command {
        Commands::Import { force, cleanup } => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received; cancelling import");
                    on_signal.cancel();
                }
            });

            let options = ImportOptions {
                force_update: force,
                cleanup_policy: cleanup,
            };
            let progress = engine.import(&options, &cancel).await?;
            print_json(&progress)?;
            if !progress.is_complete() {
                std::process::exit(1);
            }
        }
        Commands::Sync => print_json(&engine.reconcile().await?)?,
        Commands::Status => print_json(&engine.status().await?)?,
        Commands::Recover => print_json(&recovered)?,
    }

    Ok(())
}
