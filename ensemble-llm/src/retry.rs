//! Retry with exponential backoff.
//!
//! delay(n) = min(base × multiplier^n, max) × jitter,  jitter ∈ [0.9, 1.1]
//!
//! Only errors for which [`InferenceError::is_retryable`] holds are retried.
//! A non-retryable error is returned as-is; running out of attempts turns
//! the last error into [`InferenceError::Unavailable`].

use std::future::Future;
use std::time::Duration;

use ensemble_core::config::InferenceConfig;
use rand::Rng;
use tracing::{debug, warn};

use crate::error::InferenceError;

/// Backoff schedule for inference attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Growth factor per retry.
    pub multiplier: f64,
    /// Spread delays by ±10%.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl From<&InferenceConfig> for RetryPolicy {
    fn from(config: &InferenceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_backoff_ms),
            max_delay: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.backoff_multiplier.max(1.0),
            jitter: config.jitter,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Disable jitter.
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Upper bound on attempts, the first one included.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (zero-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss)]
        let base_ms = self.base_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        #[allow(clippy::cast_precision_loss)]
        let capped = base_ms.min(self.max_delay.as_millis() as f64);
        let scaled = if self.jitter {
            capped * rand::thread_rng().gen_range(0.9..=1.1)
        } else {
            capped
        };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Duration::from_millis(scaled.max(0.0) as u64)
    }

    /// Run `attempt` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `attempt` receives the zero-based attempt number.
    ///
    /// # Errors
    /// The non-retryable error as returned, or [`InferenceError::Unavailable`]
    /// once every attempt has failed.
    pub async fn run<F, Fut, T>(&self, mut attempt: F) -> Result<T, InferenceError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, InferenceError>>,
    {
        let mut n = 0;
        loop {
            match attempt(n).await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => {
                    debug!(attempt = n + 1, error = %err, "non-retryable inference error");
                    return Err(err);
                }
                Err(err) => {
                    if n >= self.max_retries {
                        warn!(attempts = n + 1, error = %err, "inference retries exhausted");
                        return Err(InferenceError::Unavailable {
                            attempts: n + 1,
                            last_error: err.to_string(),
                        });
                    }
                    let delay = self.delay_for(n);
                    warn!(attempt = n + 1, ?delay, error = %err, "retrying inference");
                    tokio::time::sleep(delay).await;
                    n += 1;
                }
            }
        }
    }
}
