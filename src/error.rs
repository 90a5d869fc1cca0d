//! # Error Types
//!
//! Structured error handling for definition loading, remote API calls, registry
//! persistence and the import/reconciliation lifecycle.
//!
//! Errors are split by where they originate so callers can tell a malformed
//! bundle file apart from a rejected activation or an unavailable registry.

use thiserror::Error;

/// Crate-wide result type
pub type DeployerResult<T> = std::result::Result<T, DeployerError>;

/// Result type for remote API operations
pub type RemoteResult<T> = std::result::Result<T, RemoteApiError>;

/// Result type for registry persistence operations
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum DeployerError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Remote workflow API is not configured")]
    NotConfigured,

    #[error(transparent)]
    Remote(#[from] RemoteApiError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("Dependency cycle detected: {}", format_cycles(.cycles))]
    DependencyCycle { cycles: Vec<Vec<String>> },

    #[error("Activation of '{name}' rejected: {message}")]
    ActivationRejected { name: String, message: String },

    #[error("Activation of '{name}' failed after {attempts} attempts: {last_error}")]
    ActivationRetriesExhausted {
        name: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Another import, sync or recovery run is already in progress")]
    RunInProgress,

    #[error("Operation cancelled: {0}")]
    Cancelled(String),
}

impl DeployerError {
    /// Message used for registry `last_error` and progress reports
    pub fn report_message(&self) -> String {
        match self {
            DeployerError::Remote(e) => e.message().to_string(),
            other => other.to_string(),
        }
    }
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|c| c.join(" -> "))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors returned by the remote workflow-automation API
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteApiError {
    /// Non-2xx response; `message` is extracted from the JSON error body when possible
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Invalid response from remote API: {0}")]
    InvalidResponse(String),

    #[error("Invalid remote URL: {0}")]
    InvalidUrl(String),
}

impl RemoteApiError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// The human-readable part of the error, without the status prefix
    pub fn message(&self) -> &str {
        match self {
            RemoteApiError::Api { message, .. } => message,
            RemoteApiError::Transport(m)
            | RemoteApiError::InvalidResponse(m)
            | RemoteApiError::InvalidUrl(m) => m,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteApiError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<reqwest::Error> for RemoteApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteApiError::InvalidResponse(err.to_string())
        } else {
            RemoteApiError::Transport(err.to_string())
        }
    }
}

/// Errors raised by a [`crate::registry::RegistryStore`]
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registry database error: {0}")]
    DatabaseError(String),

    /// The registry table has not been provisioned yet (fresh install)
    #[error("Registry table does not exist")]
    TableMissing,

    #[error("Invalid registry row for '{filename}': {reason}")]
    InvalidRow { filename: String, reason: String },

    #[error("Illegal status transition for '{filename}': {from} -> {to}")]
    IllegalTransition {
        filename: String,
        from: String,
        to: String,
    },
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for RegistryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some(crate::constants::PG_UNDEFINED_TABLE) {
                return RegistryError::TableMissing;
            }
        }
        RegistryError::DatabaseError(err.to_string())
    }
}

/// Errors raised while reading a bundled definition file
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("Failed to read '{filename}': {source}")]
    Io {
        filename: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse '{filename}': {reason}")]
    Parse { filename: String, reason: String },

    #[error("Definition '{filename}' is missing required field '{field}'")]
    MissingField { filename: String, field: String },

    #[error("Definitions directory not found: {0}")]
    DirectoryNotFound(String),
}

impl DefinitionError {
    pub fn filename(&self) -> Option<&str> {
        match self {
            DefinitionError::Io { filename, .. }
            | DefinitionError::Parse { filename, .. }
            | DefinitionError::MissingField { filename, .. } => Some(filename),
            DefinitionError::DirectoryNotFound(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_message_strips_status_for_remote_errors() {
        let err = DeployerError::from(RemoteApiError::api(400, "Workflow X is not published"));
        assert_eq!(err.report_message(), "Workflow X is not published");
        assert_eq!(err.to_string(), "HTTP 400: Workflow X is not published");
    }

    #[test]
    fn test_dependency_cycle_display() {
        let err = DeployerError::DependencyCycle {
            cycles: vec![vec!["A".into(), "B".into(), "A".into()]],
        };
        assert_eq!(err.to_string(), "Dependency cycle detected: A -> B -> A");
    }

    #[test]
    fn test_exhausted_error_names_attempts() {
        let err = DeployerError::ActivationRetriesExhausted {
            name: "Composite".into(),
            attempts: 5,
            last_error: "not published".into(),
        };
        assert!(err.to_string().contains("after 5 attempts"));
    }

    #[test]
    fn test_not_found_detection() {
        assert!(RemoteApiError::api(404, "Not Found").is_not_found());
        assert!(!RemoteApiError::Transport("reset".into()).is_not_found());
    }
}
