//! # Retry Policy and Activation Retries
//!
//! A retry policy value object, a generic `retry_with_policy` helper, and the
//! [`ActivationRetryEngine`] built on both.
//!
//! Only failures the caller's predicate marks retryable are retried; anything
//! else is returned immediately. Every back-off wait observes a
//! [`CancellationToken`] so a long retry sequence can be aborted. Tests inject a
//! zero-delay policy.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error_classifier::is_transient_activation_error;
use crate::client::{ActivationState, WorkflowApi};
use crate::error::{DeployerError, DeployerResult, RemoteApiError};

/// Exponential back-off policy
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&crate::config::RetryPolicyConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            initial_delay,
            backoff_factor,
            max_delay: None,
        }
    }

    /// Policy without any waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, 1.0)
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Wait after failed attempt number `attempt` (1-based)
    ///
    /// `initial_delay * backoff_factor^(attempt - 1)`, capped by `max_delay`.
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}

/// Why `retry_with_policy` gave up
#[derive(Debug, Clone, PartialEq)]
pub enum RetryError<E> {
    /// The predicate rejected the error; no further attempts were made
    Permanent { error: E, attempts: u32 },
    /// Every allowed attempt failed with a retryable error
    Exhausted { error: E, attempts: u32 },
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Permanent { attempts, .. }
            | RetryError::Exhausted { attempts, .. }
            | RetryError::Cancelled { attempts } => *attempts,
        }
    }
}

/// Sleep for `delay` unless `cancel` fires first; returns `false` on cancellation
pub(crate) async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    if delay.is_zero() {
        return true;
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out
///
/// `operation` receives the 1-based attempt number.
pub async fn retry_with_policy<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    is_retryable: P,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled { attempts: attempt });
        }
        attempt += 1;

        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) if !is_retryable(&error) => {
                return Err(RetryError::Permanent {
                    error,
                    attempts: attempt,
                })
            }
            Err(error) if attempt >= max_attempts => {
                return Err(RetryError::Exhausted {
                    error,
                    attempts: attempt,
                })
            }
            Err(error) => {
                let delay = policy.delay_after_attempt(attempt);
                warn!(
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Retryable failure, backing off"
                );
                if !pause(delay, cancel).await {
                    return Err(RetryError::Cancelled { attempts: attempt });
                }
            }
        }
    }
}

/// Successful activation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationOutcome {
    pub state: ActivationState,
    pub attempts: u32,
}

/// Activates a definition, retrying only publish-lag failures
pub struct ActivationRetryEngine {
    api: Arc<dyn WorkflowApi>,
    policy: RetryPolicy,
}

impl ActivationRetryEngine {
    pub fn new(api: Arc<dyn WorkflowApi>, policy: RetryPolicy) -> Self {
        Self { api, policy }
    }

    pub async fn activate(
        &self,
        name: &str,
        remote_id: &str,
        cancel: &CancellationToken,
    ) -> DeployerResult<ActivationOutcome> {
        let api = Arc::clone(&self.api);
        let result = retry_with_policy(
            &self.policy,
            cancel,
            |e: &RemoteApiError| is_transient_activation_error(e.message()),
            |attempt| {
                let api = Arc::clone(&api);
                async move {
                    debug!(name = %name, remote_id = %remote_id, attempt = attempt, "Activating definition");
                    api.activate_workflow(remote_id)
                        .await
                        .map(|state| (state, attempt))
                }
            },
        )
        .await;

        match result {
            Ok((state, attempts)) => Ok(ActivationOutcome { state, attempts }),
            Err(RetryError::Permanent { error, .. }) => Err(DeployerError::ActivationRejected {
                name: name.to_string(),
                message: error.message().to_string(),
            }),
            Err(RetryError::Exhausted { error, attempts }) => {
                Err(DeployerError::ActivationRetriesExhausted {
                    name: name.to_string(),
                    attempts,
                    last_error: error.message().to_string(),
                })
            }
            Err(RetryError::Cancelled { attempts }) => Err(DeployerError::Cancelled(format!(
                "activation of '{name}' after {attempts} attempts"
            ))),
        }
    }
}
