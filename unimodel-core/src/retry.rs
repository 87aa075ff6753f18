//! Retry policy and executor
//!
//! Retries are centralized here: model implementations never loop on their
//! own. The executor consults each failure's retry verdict, the policy's
//! budget and the request context before waiting and trying again.

use crate::context::RequestContext;
use crate::error::CoreError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not including the initial attempt)
    pub max_retries: u32,

    /// Initial delay before first retry (milliseconds)
    pub initial_delay_ms: u64,

    /// Maximum delay between retries (milliseconds)
    pub max_delay_ms: u64,

    /// Base for exponential backoff (e.g., 2.0 for doubling, 1.0 for constant)
    pub exponential_base: f64,

    /// Jitter factor (0.0 to 1.0) to randomize delays
    pub jitter_factor: f64,

    /// Whether to honor a server-provided retry-after hint
    pub respect_retry_after: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 10_000,
            exponential_base: 2.0,
            jitter_factor: 0.1,
            respect_retry_after: true,
        }
    }
}

impl RetryPolicy {
    /// Default policy with a custom retry budget
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// More attempts, shorter waits
    pub fn aggressive() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 50,
            max_delay_ms: 5_000,
            exponential_base: 1.5,
            jitter_factor: 0.2,
            respect_retry_after: true,
        }
    }

    /// Fewer attempts, longer waits
    pub fn conservative() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 500,
            max_delay_ms: 15_000,
            exponential_base: 3.0,
            jitter_factor: 0.3,
            respect_retry_after: true,
        }
    }

    /// Exactly one attempt
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (0-based).
    ///
    /// A server retry-after hint replaces the computed backoff but is still
    /// capped at `max_delay_ms`.
    pub fn calculate_delay(&self, attempt: u32, error: &CoreError) -> Duration {
        if self.respect_retry_after {
            if let Some(retry_after) = error.diagnostic().and_then(|d| d.retry_after) {
                return retry_after.min(Duration::from_millis(self.max_delay_ms));
            }
        }

        let base_delay =
            self.initial_delay_ms as f64 * self.exponential_base.powi(attempt.min(i32::MAX as u32) as i32);
        let capped_delay = base_delay.min(self.max_delay_ms as f64);

        let delay_with_jitter = if self.jitter_factor > 0.0 {
            let jitter_range = capped_delay * self.jitter_factor.min(1.0);
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (capped_delay + jitter).max(0.0)
        } else {
            capped_delay
        };

        Duration::from_millis(delay_with_jitter as u64)
    }

    /// Whether `error` after `attempt` retries already used may be retried
    pub fn should_retry(&self, error: &CoreError, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_retryable()
    }
}

/// Outcome of a retried operation
#[derive(Debug, Clone)]
pub struct RetryResult<T> {
    /// Final value or the failure that ended the loop
    pub outcome: Result<T, CoreError>,

    /// Number of times the operation was invoked
    pub attempts: u32,

    /// Total time spent waiting between attempts
    pub total_delay: Duration,

    /// Every failure observed, in order
    pub error_history: Vec<CoreError>,
}

impl<T> RetryResult<T> {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn into_result(self) -> Result<T, CoreError> {
        self.outcome
    }
}

/// Executor for retry operations
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation`, retrying retryable failures within the policy budget.
    ///
    /// The context is checked before the first attempt and around every
    /// backoff wait; once it is done the executor stops with
    /// [`CoreError::Cancelled`].
    pub async fn execute<F, Fut, T>(&self, ctx: Option<&RequestContext>, mut operation: F) -> RetryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut attempts = 0;
        let mut total_delay = Duration::ZERO;
        let mut error_history = Vec::new();

        if crate::context::is_done(ctx) {
            return RetryResult {
                outcome: Err(CoreError::Cancelled),
                attempts,
                total_delay,
                error_history,
            };
        }

        loop {
            attempts += 1;
            let error = match operation().await {
                Ok(value) => {
                    return RetryResult {
                        outcome: Ok(value),
                        attempts,
                        total_delay,
                        error_history,
                    };
                }
                Err(error) => error,
            };
            error_history.push(error.clone());

            if !self.policy.should_retry(&error, attempts - 1) {
                if error.is_retryable() {
                    warn!(attempts = attempts, error = %error, "retry budget exhausted");
                } else {
                    debug!(error = %error, "failure is not retryable");
                }
                return RetryResult {
                    outcome: Err(error),
                    attempts,
                    total_delay,
                    error_history,
                };
            }

            let mut delay = self.policy.calculate_delay(attempts - 1, &error);
            if let Some(remaining) = ctx.and_then(RequestContext::remaining) {
                delay = delay.min(remaining);
            }

            if !self.wait(ctx, delay).await {
                debug!(attempts = attempts, "request context done during backoff");
                return RetryResult {
                    outcome: Err(CoreError::Cancelled),
                    attempts,
                    total_delay,
                    error_history,
                };
            }
            total_delay += delay;

            debug!(
                attempt = attempts + 1,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying after retryable failure"
            );
        }
    }

    /// Sleep for `delay` unless the context finishes first.
    /// Returns false when the context is done before or after the wait.
    async fn wait(&self, ctx: Option<&RequestContext>, delay: Duration) -> bool {
        match ctx {
            Some(ctx) => {
                if ctx.is_done() {
                    return false;
                }
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = ctx.done() => {}
                }
                !ctx.is_done()
            }
            None => {
                tokio::time::sleep(delay).await;
                true
            }
        }
    }
}
