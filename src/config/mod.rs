//! # Deployment Configuration
//!
//! Typed configuration for the remote API connection, the import run and the
//! registry database.
//!
//! ## Architecture
//!
//! - **Layered sources**: built-in defaults, then an optional YAML file, then
//!   `FLOWSYNC__*` environment variables (see [`loader::ConfigManager`])
//! - **Explicit injection**: the remote connection settings are resolved through a
//!   [`RemoteConfigProvider`] and handed to each client constructor; nothing is
//!   cached in process-wide state
//! - **Validation**: malformed URLs, empty API keys and unusable retry policies are
//!   rejected at load time
//!
//! ## Usage
//!
//! ```rust,no_run
//! use flowsync_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load(None)?;
//! let settings = &manager.config().import;
//! println!("definitions in {}", settings.definitions_dir.display());
//! # Ok(())
//! # }
//! ```

pub mod loader;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{api, timing};
use crate::error::{DeployerError, DeployerResult};
use crate::orchestration::cleanup::CleanupPolicy;
use crate::orchestration::retry::RetryPolicy;

pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/flowsync.yaml`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DeployerConfig {
    /// Remote instance connection; `None` means "not configured"
    pub remote: Option<RemoteApiConfig>,

    /// Import run behaviour
    pub import: ImportSettings,

    /// Registry database connection
    pub database: DatabaseConfig,
}

impl DeployerConfig {
    pub fn validate(&self) -> DeployerResult<()> {
        if let Some(remote) = &self.remote {
            remote.validate()?;
        }
        self.import.activation_retry.validate()?;
        Ok(())
    }
}

/// Connection settings for the remote workflow-automation instance
#[derive(Clone, Deserialize, Serialize)]
pub struct RemoteApiConfig {
    /// Instance root, e.g. `https://automation.example.com`
    pub api_url: String,

    pub api_key: String,

    /// Public base URL used to build trigger endpoint URLs
    #[serde(default)]
    pub webhook_base_url: Option<String>,

    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,

    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_api_key_header() -> String {
    api::DEFAULT_API_KEY_HEADER.to_string()
}

fn default_request_timeout_ms() -> u64 {
    timing::DEFAULT_REQUEST_TIMEOUT_MS
}

impl RemoteApiConfig {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            webhook_base_url: None,
            api_key_header: default_api_key_header(),
            timeout_ms: default_request_timeout_ms(),
        }
    }

    pub fn with_webhook_base_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_base_url = Some(url.into());
        self
    }

    pub fn validate(&self) -> DeployerResult<()> {
        url::Url::parse(&self.api_url).map_err(|e| {
            DeployerError::ConfigurationError(format!("Invalid api_url '{}': {e}", self.api_url))
        })?;
        if self.api_key.trim().is_empty() {
            return Err(DeployerError::ConfigurationError(
                "api_key must not be empty".to_string(),
            ));
        }
        if let Some(webhook) = &self.webhook_base_url {
            url::Url::parse(webhook).map_err(|e| {
                DeployerError::ConfigurationError(format!(
                    "Invalid webhook_base_url '{webhook}': {e}"
                ))
            })?;
        }
        Ok(())
    }

    /// Webhook base, falling back to the API URL when no public base is set
    pub fn effective_webhook_base(&self) -> &str {
        self.webhook_base_url
            .as_deref()
            .unwrap_or(&self.api_url)
            .trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl std::fmt::Debug for RemoteApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteApiConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"***")
            .field("webhook_base_url", &self.webhook_base_url)
            .field("api_key_header", &self.api_key_header)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Import run behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Directory holding the bundled definition files
    pub definitions_dir: PathBuf,

    /// Declared load order: foundation sub-definitions first, entry definitions last
    pub definition_order: Vec<String>,

    pub phase1_delay_ms: u64,

    pub phase2_delay_ms: u64,

    pub activation_retry: RetryPolicyConfig,

    /// Applied automatically to failed activations when set
    pub cleanup_policy: Option<CleanupPolicy>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            definitions_dir: PathBuf::from("workflows"),
            definition_order: Vec::new(),
            phase1_delay_ms: timing::DEFAULT_PHASE1_DELAY_MS,
            phase2_delay_ms: timing::DEFAULT_PHASE2_DELAY_MS,
            activation_retry: RetryPolicyConfig::default(),
            cleanup_policy: None,
        }
    }
}

impl ImportSettings {
    pub fn phase1_delay(&self) -> Duration {
        Duration::from_millis(self.phase1_delay_ms)
    }

    pub fn phase2_delay(&self) -> Duration {
        Duration::from_millis(self.phase2_delay_ms)
    }
}

/// Serialized form of [`RetryPolicy`]
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryPolicyConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: Option<u64>,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: timing::DEFAULT_ACTIVATION_MAX_ATTEMPTS,
            initial_delay_ms: timing::DEFAULT_ACTIVATION_INITIAL_DELAY_MS,
            backoff_factor: timing::DEFAULT_ACTIVATION_BACKOFF_FACTOR,
            max_delay_ms: None,
        }
    }
}

impl RetryPolicyConfig {
    pub fn validate(&self) -> DeployerResult<()> {
        if self.max_attempts == 0 {
            return Err(DeployerError::ConfigurationError(
                "activation_retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if !(self.backoff_factor >= 1.0) {
            return Err(DeployerError::ConfigurationError(format!(
                "activation_retry.backoff_factor must be >= 1.0, got {}",
                self.backoff_factor
            )));
        }
        Ok(())
    }
}

impl From<&RetryPolicyConfig> for RetryPolicy {
    fn from(config: &RetryPolicyConfig) -> Self {
        RetryPolicy {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            backoff_factor: config.backoff_factor,
            max_delay: config.max_delay_ms.map(Duration::from_millis),
        }
    }
}

/// Registry database connection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

/// Source of the remote connection settings
///
/// Implementations may decrypt stored secrets or read a settings table; the
/// engine only needs the resolved value or "not configured".
#[async_trait]
pub trait RemoteConfigProvider: Send + Sync {
    async fn remote_config(&self) -> DeployerResult<Option<RemoteApiConfig>>;
}

/// Provider returning a fixed, already-resolved configuration
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    config: Option<RemoteApiConfig>,
}

impl StaticConfigProvider {
    pub fn new(config: Option<RemoteApiConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RemoteConfigProvider for StaticConfigProvider {
    async fn remote_config(&self) -> DeployerResult<Option<RemoteApiConfig>> {
        Ok(self.config.clone())
    }
}
