use serde::{Deserialize, Serialize};
use std::fmt;

/// Deployment state of a bundled definition as recorded in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    /// Never successfully imported, or reset
    Pending,
    /// Create call in flight
    Importing,
    /// Update call in flight
    Updating,
    /// Phase 1 succeeded, waiting for activation
    PendingActivation,
    /// Created and active
    Imported,
    /// Activation or import failed
    Failed,
}

impl ImportStatus {
    pub const ALL: [ImportStatus; 6] = [
        Self::Pending,
        Self::Importing,
        Self::Updating,
        Self::PendingActivation,
        Self::Imported,
        Self::Failed,
    ];

    /// Terminal states end an import cycle but may be re-entered by the next one
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Imported | Self::Failed)
    }

    /// States that only exist while an in-process run owns the row
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Importing | Self::Updating)
    }

    /// Only a successful import may be marked active
    pub fn permits_active(&self) -> bool {
        matches!(self, Self::Imported)
    }

    /// Whether the registry may move from `self` to `next`
    pub fn can_transition_to(&self, next: ImportStatus) -> bool {
        use ImportStatus::*;
        match (*self, next) {
            // Flag-only updates keep the status
            (a, b) if a == b => true,
            // Resets: rollback, cleanup, recovery, reconciliation
            (_, Pending) => true,
            // A new cycle may start from any state, including a stale in-flight row
            (_, Importing | Updating) => true,
            (Importing | Updating, PendingActivation | Failed) => true,
            (PendingActivation, Imported | Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Importing => write!(f, "importing"),
            Self::Updating => write!(f, "updating"),
            Self::PendingActivation => write!(f, "pending_activation"),
            Self::Imported => write!(f, "imported"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for ImportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "importing" => Ok(Self::Importing),
            "updating" => Ok(Self::Updating),
            "pending_activation" => Ok(Self::PendingActivation),
            "imported" => Ok(Self::Imported),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid import status: {s}")),
        }
    }
}

impl Default for ImportStatus {
    fn default() -> Self {
        Self::Pending
    }
}
