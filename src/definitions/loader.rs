//! # Bundled Definition Loader
//!
//! Reads definition files from the bundle directory in the declared order.
//!
//! The order is hand-curated rather than alphabetical: foundation sub-definitions
//! come first and composite entry definitions last. A malformed or missing file
//! is skipped with a warning and reported; it never fails the whole load.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{content_checksum, BundledDefinition};
use crate::error::{DefinitionError, DeployerResult};

/// A file that could not be loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedDefinition {
    pub filename: String,
    pub reason: String,
}

/// Result of loading the bundle
#[derive(Debug, Clone, Default)]
pub struct LoadedBundle {
    /// Definitions in declared order
    pub definitions: Vec<BundledDefinition>,
    pub skipped: Vec<SkippedDefinition>,
}

impl LoadedBundle {
    /// Number of definitions that need credentials configured by hand after import
    pub fn credentials_required(&self) -> usize {
        self.definitions
            .iter()
            .filter(|d| d.has_secret_references)
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct BundledDefinitionLoader {
    directory: PathBuf,
    order: Vec<String>,
}

impl BundledDefinitionLoader {
    pub fn new(directory: impl Into<PathBuf>, order: Vec<String>) -> Self {
        Self {
            directory: directory.into(),
            order,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Load every declared file
    ///
    /// Only a missing bundle directory is an error; per-file problems end up in
    /// [`LoadedBundle::skipped`].
    pub async fn load(&self) -> DeployerResult<LoadedBundle> {
        if !tokio::fs::try_exists(&self.directory).await.unwrap_or(false) {
            return Err(DefinitionError::DirectoryNotFound(
                self.directory.display().to_string(),
            )
            .into());
        }

        let mut bundle = LoadedBundle::default();
        for filename in &self.order {
            if bundle.definitions.iter().any(|d| &d.filename == filename) {
                debug!(filename = %filename, "Duplicate entry in definition order, ignoring");
                continue;
            }
            match self.load_file(filename).await {
                Ok(definition) => {
                    debug!(
                        filename = %filename,
                        name = %definition.name,
                        nodes = definition.node_count,
                        dependencies = ?definition.dependency_names,
                        "Loaded bundled definition"
                    );
                    bundle.definitions.push(definition);
                }
                Err(e) => {
                    warn!(filename = %filename, error = %e, "Skipping bundled definition");
                    bundle.skipped.push(SkippedDefinition {
                        filename: filename.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            directory = %self.directory.display(),
            loaded = bundle.definitions.len(),
            skipped = bundle.skipped.len(),
            credentials_required = bundle.credentials_required(),
            "Bundled definitions loaded"
        );

        Ok(bundle)
    }

    /// Load a single file by name
    pub async fn load_file(&self, filename: &str) -> Result<BundledDefinition, DefinitionError> {
        let path = self.directory.join(filename);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| DefinitionError::Io {
                filename: filename.to_string(),
                source,
            })?;

        let document: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| DefinitionError::Parse {
                filename: filename.to_string(),
                reason: e.to_string(),
            })?;

        let checksum = content_checksum(&bytes);
        BundledDefinition::new(filename.to_string(), checksum, document).map_err(|field| {
            DefinitionError::MissingField {
                filename: filename.to_string(),
                field: field.to_string(),
            }
        })
    }
}
