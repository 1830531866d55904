//! Bounded retry with linear backoff.
//!
//! The FTP connector wraps each file transfer in a [`RetryPolicy`]: up to three
//! attempts, sleeping `attempt * step` after each failure (1s, then 2s). The
//! remote-copy connector does not retry; its failures go straight back to the
//! worker pool, which requeues the item.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use dljob_core::download::{RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! assert_eq!(
//!     policy.should_retry(1),
//!     RetryDecision::Retry { delay: Duration::from_secs(1), attempt: 2 }
//! );
//! assert!(matches!(policy.should_retry(3), RetryDecision::DoNotRetry { .. }));
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::constants::{FTP_BACKOFF_STEP, FTP_MAX_ATTEMPTS};

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number comes next (1-indexed).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason.
        reason: String,
    },
}

/// Bounded attempts with a linear backoff between them.
///
/// # Delay Calculation
///
/// ```text
/// delay after attempt n = step * n
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Backoff step multiplied by the failed attempt number.
    step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: FTP_MAX_ATTEMPTS,
            step: FTP_BACKOFF_STEP,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, step: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            step,
        }
    }

    /// Single attempt, no retry.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the backoff step.
    #[must_use]
    pub fn step(&self) -> Duration {
        self.step
    }

    /// Decides what to do after `attempt` (1-indexed) has failed.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        RetryDecision::Retry {
            delay: self.step.saturating_mul(attempt),
            attempt: attempt + 1,
        }
    }

    /// Runs `operation` until it succeeds or attempts are exhausted.
    ///
    /// Returns the last error together with the number of attempts made.
    ///
    /// # Errors
    ///
    /// Returns `(error, attempts)` from the final failed attempt.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, (E, u32)>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 1u32;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => match self.should_retry(attempt) {
                    RetryDecision::Retry {
                        delay,
                        attempt: next,
                    } => {
                        warn!(
                            target_name = label,
                            attempt,
                            max_attempts = self.max_attempts,
                            delay_ms = delay.as_millis(),
                            error = %error,
                            "attempt failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt = next;
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        debug!(target_name = label, %reason, "not retrying");
                        return Err((error, attempt));
                    }
                },
            }
        }
    }
}
