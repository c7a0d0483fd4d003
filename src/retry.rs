//! Retry with exponential backoff for backend calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, warn};

use crate::error::BackendError;

/// Backoff schedule for a retried operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Ceiling for the growing delay.
    pub max_delay: Duration,
    /// Growth factor applied after each failed attempt.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Same attempt count as the default policy with no waiting between
    /// attempts. Intended for tests.
    pub fn instant() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    fn next_delay(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier).min(self.max_delay)
    }
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// Non-retryable errors (see [`BackendError::is_retryable`]) are returned
/// immediately. Intermediate failures are logged at warn level; only the
/// final failure is returned to the caller.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    op_name: &str,
    mut op: F,
) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let mut delay = policy.initial_delay;
    let mut last_error: Option<BackendError> = None;

    for attempt in 1..=policy.max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => {
                if attempt < policy.max_attempts {
                    warn!(
                        operation = op_name,
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "operation failed, retrying"
                    );
                    sleep(delay).await;
                    delay = policy.next_delay(delay);
                } else {
                    error!(
                        operation = op_name,
                        attempts = policy.max_attempts,
                        error = %err,
                        "operation failed after all attempts"
                    );
                }
                last_error = Some(err);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| BackendError::Transport(format!("{op_name} was never attempted"))))
}
