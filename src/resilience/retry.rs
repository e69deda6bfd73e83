//! Retry with linearly growing backoff.

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Decides whether, and after how long, a failed attempt is re-run.
///
/// `attempt` is 1-based: the first retry is attempt 1.
pub trait ResiliencePolicy: Send + Sync {
    fn should_retry(&self, attempt: u32, error: &Error) -> Option<Duration>;
}

/// Re-invoke a failing operation up to `retries` more times, sleeping
/// `backoff × attempt` before each retry.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, backoff: Duration) -> Self {
        Self { retries, backoff }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }

    /// Run `op` under this policy. The last error is returned unchanged once
    /// retries are exhausted or the error is not retryable.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    let Some(delay) = self.should_retry(attempt, &err) else {
                        if attempt > self.retries {
                            warn!(attempts = attempt, error = %err, "retries exhausted");
                        }
                        return Err(err);
                    };
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after failure"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl ResiliencePolicy for RetryPolicy {
    fn should_retry(&self, attempt: u32, error: &Error) -> Option<Duration> {
        if attempt > self.retries || !error.is_retryable() {
            return None;
        }
        Some(self.delay_for(attempt))
    }
}
