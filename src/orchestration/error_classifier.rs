//! # Activation Error Classification
//!
//! Central place for deciding what a remote error message means.
//!
//! ## Overview
//!
//! The remote system refuses to activate a definition that references another
//! definition it has not finished indexing/publishing yet. Those failures clear up
//! on their own and are worth retrying; everything else (missing credentials,
//! validation problems) is a real defect and must surface immediately.
//!
//! Classification is by case-insensitive substring match against fixed pattern
//! lists, kept here rather than inline at call sites so the predicates can be
//! tested on their own.
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────────────┐     ┌──────────────────┐
//! │ Error message   │────▶│ classify_activation_error│────▶│ ErrorCategory    │
//! └─────────────────┘     └──────────────────────────┘     └──────────────────┘
//! ```

use serde::{Deserialize, Serialize};

/// Messages caused by publish/index lag on the remote side
pub const TRANSIENT_ACTIVATION_PATTERNS: [&str; 5] = [
    "not published",
    "references workflow",
    "cannot publish",
    "not yet available",
    "failed to execute workflow",
];

/// Messages meaning a definition needs credentials configured by hand
pub const MISSING_CREDENTIAL_PATTERNS: [&str; 3] = [
    "credential",
    "credentials not found",
    "missing credentials",
];

/// Messages meaning the remote rejected the definition content
pub const VALIDATION_PATTERNS: [&str; 4] = [
    "validation",
    "invalid",
    "must have",
    "is required",
];

/// Deactivating something already inactive is not a failure
pub const ALREADY_INACTIVE_PATTERNS: [&str; 3] =
    ["already inactive", "not active", "is inactive"];

/// Primary categories for activation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Publish/index lag; retried with backoff
    TransientPublish,
    /// Credentials must be configured on the remote instance
    MissingCredentials,
    /// The remote rejected the definition content
    Validation,
    Other,
}

impl ErrorCategory {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::TransientPublish)
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::TransientPublish => write!(f, "Transient Publish"),
            ErrorCategory::MissingCredentials => write!(f, "Missing Credentials"),
            ErrorCategory::Validation => write!(f, "Validation"),
            ErrorCategory::Other => write!(f, "Other"),
        }
    }
}

fn matches_any(message: &str, patterns: &[&str]) -> bool {
    let lowered = message.to_lowercase();
    patterns.iter().any(|p| lowered.contains(p))
}

/// Whether an activation failure is caused by publish lag and should be retried
pub fn is_transient_activation_error(message: &str) -> bool {
    matches_any(message, &TRANSIENT_ACTIVATION_PATTERNS)
}

/// Whether a deactivation failure only says the definition was not active
pub fn is_already_inactive_error(message: &str) -> bool {
    matches_any(message, &ALREADY_INACTIVE_PATTERNS)
}

/// Categorise an activation failure message
///
/// Transient patterns win: a "failed to execute workflow" message that also
/// mentions credentials is still publish lag.
pub fn classify_activation_error(message: &str) -> ErrorCategory {
    if is_transient_activation_error(message) {
        ErrorCategory::TransientPublish
    } else if matches_any(message, &MISSING_CREDENTIAL_PATTERNS) {
        ErrorCategory::MissingCredentials
    } else if matches_any(message, &VALIDATION_PATTERNS) {
        ErrorCategory::Validation
    } else {
        ErrorCategory::Other
    }
}
