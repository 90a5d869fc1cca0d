//! Single-run guard.
//!
//! Import, reconciliation, recovery and cleanup all write the registry and must
//! not overlap. Every operation of one [`crate::orchestration::DeploymentEngine`]
//! takes the same [`RunLock`]; a second caller fails fast instead of waiting.
//!
//! The guard is process-local. Separate processes sharing a registry database
//! are not coordinated.

use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::error::{DeployerError, DeployerResult};

#[derive(Debug, Clone, Default)]
pub struct RunLock {
    inner: Arc<Mutex<()>>,
}

/// Held for the duration of a run; released on drop
#[derive(Debug)]
pub struct RunGuard {
    operation: &'static str,
    _guard: OwnedMutexGuard<()>,
}

impl RunGuard {
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        debug!(operation = self.operation, "Run lock released");
    }
}

impl RunLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire without waiting, or fail with [`DeployerError::RunInProgress`]
    pub fn try_acquire(&self, operation: &'static str) -> DeployerResult<RunGuard> {
        let guard = Arc::clone(&self.inner)
            .try_lock_owned()
            .map_err(|_| DeployerError::RunInProgress)?;
        debug!(operation = operation, "Run lock acquired");
        Ok(RunGuard {
            operation,
            _guard: guard,
        })
    }

    pub fn is_held(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_fast() {
        let lock = RunLock::new();
        let guard = lock.try_acquire("import").unwrap();
        assert_eq!(guard.operation(), "import");
        assert!(lock.is_held());

        let err = lock.clone().try_acquire("sync").unwrap_err();
        assert!(matches!(err, DeployerError::RunInProgress));

        drop(guard);
        assert!(!lock.is_held());
        assert!(lock.try_acquire("sync").is_ok());
    }
}
