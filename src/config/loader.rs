//! Configuration Loader
//!
//! Environment-aware configuration loading. Sources are layered with the `config`
//! crate: defaults, then the YAML file, then `FLOWSYNC__*` environment variables.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::DeployerConfig;
use crate::error::{DeployerError, DeployerResult};

const DEFAULT_CONFIG_FILE: &str = "config/flowsync.yaml";
const ENV_PREFIX: &str = "FLOWSYNC";
const ENV_SEPARATOR: &str = "__";

/// Loaded, validated configuration
#[derive(Debug)]
pub struct ConfigManager {
    config: DeployerConfig,
    source_file: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration from `path` (or the default file) plus environment overrides
    pub fn load(path: Option<&Path>) -> DeployerResult<Arc<ConfigManager>> {
        let file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let explicit = path.is_some();

        if explicit && !file.exists() {
            return Err(DeployerError::ConfigurationError(format!(
                "Configuration file not found: {}",
                file.display()
            )));
        }

        let builder = config::Config::builder()
            .add_source(config::File::from(file.clone()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .list_separator(",")
                    .with_list_parse_key("import.definition_order")
                    .try_parsing(true),
            );

        let config = Self::build(builder)?;
        let source_file = file.exists().then_some(file);

        info!(
            source = %source_file.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "defaults".to_string()),
            remote_configured = config.remote.is_some(),
            definitions = config.import.definition_order.len(),
            "Configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            source_file,
        }))
    }

    /// Parse configuration from a YAML string, without environment overrides
    pub fn from_yaml_str(yaml: &str) -> DeployerResult<ConfigManager> {
        let builder = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml));
        Ok(ConfigManager {
            config: Self::build(builder)?,
            source_file: None,
        })
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> DeployerResult<DeployerConfig> {
        let config: DeployerConfig = builder
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(|e| DeployerError::ConfigurationError(e.to_string()))?;

        config.validate()?;
        debug!(config = ?config, "Configuration validated");
        Ok(config)
    }

    pub fn config(&self) -> &DeployerConfig {
        &self.config
    }

    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }
}
