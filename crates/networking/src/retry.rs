//! Retry policy for idempotent requests
//!
//! Wraps the `backoff` crate with a small builder-style configuration. Only
//! reads should be retried; remote writes are single-attempt.

use backoff::ExponentialBackoff;
use backoff::ExponentialBackoffBuilder;
use std::future::Future;
use std::time::Duration;

use crate::client::HttpError;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Give up once this much time has elapsed
    pub max_elapsed: Duration,
    /// Backoff multiplier (e.g., 2.0 for exponential backoff)
    pub backoff_multiplier: f64,
    /// Jitter applied to each delay, between 0.0 and 1.0
    pub randomization_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            max_elapsed: Duration::from_secs(20),
            backoff_multiplier: 2.0,
            randomization_factor: 0.5,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries
    pub fn disabled() -> Self {
        Self { max_elapsed: Duration::ZERO, ..Default::default() }
    }

    /// Set the initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the total time budget
    pub fn with_max_elapsed(mut self, elapsed: Duration) -> Self {
        self.max_elapsed = elapsed;
        self
    }

    /// Set the backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set the jitter factor
    pub fn with_randomization_factor(mut self, factor: f64) -> Self {
        self.randomization_factor = factor;
        self
    }

    fn to_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_delay)
            .with_max_interval(self.max_delay)
            .with_multiplier(self.backoff_multiplier)
            .with_randomization_factor(self.randomization_factor)
            .with_max_elapsed_time(Some(self.max_elapsed))
            .build()
    }
}

/// Retry `operation` while it fails with a retryable [`HttpError`]
pub async fn retry_http<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T, HttpError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, HttpError>>,
{
    backoff::future::retry(config.to_backoff(), || {
        let attempt = operation();
        async move {
            attempt.await.map_err(|err| {
                if err.is_retryable() {
                    tracing::debug!(error = %err, "retrying request");
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                }
            })
        }
    })
    .await
}
