//! Bounded exponential-backoff retry
//!
//! [`RetryPolicy::execute`] runs an operation in an explicit loop. A fresh
//! [`RetryState`] is created per call, so attempts never leak between logical
//! operations.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::config::{calculate_backoff, AcquisitionConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY_MS};
use crate::fetcher::retry_formatter::RetryContext;
use crate::metrics::record_retry_backoff;

/// Retry bookkeeping for one logical operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// Attempts made so far
    pub attempt: u32,
    /// Delay before the next attempt
    pub next_delay: Duration,
}

impl RetryState {
    fn new(base_delay: Duration) -> Self {
        Self {
            attempt: 0,
            next_delay: base_delay,
        }
    }
}

/// Why a retried operation gave up
#[derive(Debug)]
pub enum RetryError<E> {
    /// The error was classified as not retryable
    Rejected {
        /// Attempts made, including the rejected one
        attempts: u32,
        /// The error
        error: E,
    },
    /// Every attempt failed with a retryable error
    Exhausted {
        /// Attempts made
        attempts: u32,
        /// Error from the final attempt
        last: E,
    },
}

impl<E> RetryError<E> {
    /// The underlying error
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Rejected { error, .. } => error,
            RetryError::Exhausted { last, .. } => last,
        }
    }

    /// Borrow the underlying error
    pub fn error(&self) -> &E {
        match self {
            RetryError::Rejected { error, .. } => error,
            RetryError::Exhausted { last, .. } => last,
        }
    }

    /// Attempts made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Rejected { attempts, .. } | RetryError::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    /// Whether the retry budget ran out
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }
}

impl<E: Display> Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryError::Rejected { error, .. } => write!(f, "{error}"),
            RetryError::Exhausted { attempts, last } => {
                write!(f, "{last} (gave up after {attempts} attempts)")
            }
        }
    }
}

/// Exponential backoff policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
        )
    }
}

impl RetryPolicy {
    /// Create a policy
    ///
    /// # Arguments
    /// * `max_attempts` - Total attempts including the first (0 is treated as 1)
    /// * `base_delay` - Delay before the first retry; doubles for each retry after
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Policy matching an [`AcquisitionConfig`]
    pub fn from_config(config: &AcquisitionConfig) -> Self {
        Self::new(config.max_attempts, config.retry_base_delay)
    }

    /// Total attempts allowed
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Base delay
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Delay before retry number `retry` (1-based): `base * 2^(retry - 1)`
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        calculate_backoff(self.base_delay, retry.saturating_sub(1))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the budget runs out
    ///
    /// # Arguments
    /// * `operation` - Label used in retry log lines
    /// * `op` - Produces one attempt per call
    /// * `is_retryable` - Classifies a failure
    pub async fn execute<T, E, F, Fut, R>(
        &self,
        operation: &str,
        mut op: F,
        is_retryable: R,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: Display,
    {
        let mut state = RetryState::new(self.base_delay);

        loop {
            let error = match op().await {
                Ok(value) => {
                    if state.attempt > 0 {
                        let ctx = RetryContext::new(
                            state.attempt + 1,
                            self.max_attempts,
                            "",
                            Duration::ZERO,
                            operation,
                            "",
                        );
                        debug!("{}", ctx.format_success());
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            state.attempt += 1;

            if !is_retryable(&error) {
                debug!(
                    operation = operation,
                    attempt = state.attempt,
                    error = %error,
                    "Non-retryable error, giving up immediately"
                );
                return Err(RetryError::Rejected {
                    attempts: state.attempt,
                    error,
                });
            }

            if state.attempt >= self.max_attempts {
                warn!(
                    operation = operation,
                    attempts = state.attempt,
                    error = %error,
                    "Retry budget exhausted"
                );
                return Err(RetryError::Exhausted {
                    attempts: state.attempt,
                    last: error,
                });
            }

            state.next_delay = self.delay_for_retry(state.attempt);

            let ctx = RetryContext::new(
                state.attempt,
                self.max_attempts,
                error.to_string(),
                state.next_delay,
                operation,
                error.to_string(),
            );
            warn!(
                operation = operation,
                attempt = state.attempt,
                remaining_attempts = ctx.remaining_attempts(),
                backoff_ms = state.next_delay.as_millis() as u64,
                "{}",
                ctx.format_retry()
            );
            record_retry_backoff(state.next_delay, state.attempt);

            tokio::time::sleep(state.next_delay).await;
        }
    }
}
