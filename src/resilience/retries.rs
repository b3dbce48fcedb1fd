//! Retry logic.
//!
//! # Responsibilities
//! - Re-run a failed upstream attempt a bounded number of times
//! - Wait a jittered exponential backoff between attempts
//! - Only retry transient failures (see `UpstreamError::is_retryable`)

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::UpstreamError;
use crate::observability::metrics;
use crate::resilience::backoff::Backoff;

/// Bounded retry with backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        let attempts = if config.enabled { config.max_attempts } else { 1 };
        Self::new(attempts, Backoff::from_config(config))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Longest a call can take when every attempt hits `attempt_timeout`,
    /// counting backoff waits at their jitter ceiling.
    pub fn worst_case(&self, attempt_timeout: Duration) -> Duration {
        let waits: Duration = (1..self.max_attempts)
            .map(|n| {
                let ceiling = self.backoff.ceiling(n);
                ceiling + ceiling / 10
            })
            .sum();
        attempt_timeout.saturating_mul(self.max_attempts) + waits
    }

    /// Run `attempt` until it succeeds, fails permanently, or attempts run out.
    ///
    /// The closure receives the 1-based attempt number.
    pub async fn run<F, Fut, T>(&self, operation: &str, mut attempt: F) -> Result<T, UpstreamError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let mut n = 1;
        loop {
            match attempt(n).await {
                Ok(value) => {
                    metrics::record_upstream_attempt(operation, "success");
                    if n > 1 {
                        tracing::info!(operation, attempt = n, "Upstream call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    metrics::record_upstream_attempt(operation, e.class());
                    if !e.is_retryable() || n >= self.max_attempts {
                        tracing::warn!(
                            operation,
                            attempt = n,
                            error_class = e.class(),
                            error = %e,
                            "Upstream call failed"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff.delay(n);
                    tracing::debug!(
                        operation,
                        attempt = n,
                        delay_ms = delay.as_millis() as u64,
                        error_class = e.class(),
                        "Retrying upstream call"
                    );
                    tokio::time::sleep(delay).await;
                    n += 1;
                }
            }
        }
    }
}
