//! Composition of retry, circuit breaker and rate limiter around one operation.

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot};
use super::rate_limiter::{RateLimiter, RateLimiterConfig, Throttle};
use super::retry::RetryPolicy;
use crate::config::ResilienceSettings;
use crate::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Policy bundle for one protected operation.
#[derive(Debug, Clone, Default)]
pub struct ResilienceConfig {
    pub rate_limit: RateLimiterConfig,
    pub breaker: CircuitBreakerConfig,
    pub retry: RetryPolicy,
}

impl ResilienceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimiterConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_breaker(mut self, breaker: CircuitBreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn from_settings(settings: &ResilienceSettings) -> Self {
        Self {
            rate_limit: RateLimiterConfig::new()
                .with_rate(settings.rate_per_sec)
                .with_capacity(settings.burst),
            breaker: CircuitBreakerConfig::new()
                .with_max_failures(settings.max_failures)
                .with_reset_timeout(Duration::from_secs(settings.reset_timeout_secs)),
            retry: RetryPolicy::new(settings.retries, Duration::from_millis(settings.backoff_ms)),
        }
    }
}

/// Retry ⊃ circuit breaker ⊃ rate limiter ⊃ operation.
///
/// Each attempt first asks the breaker, then pays the limiter, then runs the
/// operation and reports the outcome back to the breaker. An open breaker
/// rejects the attempt before any quota is spent, and that rejection is not
/// retried. Limiter and breaker state belong to this instance, so build one
/// `Resilient` per protected operation and keep it for the process lifetime.
pub struct Resilient {
    name: String,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
    throttle: Arc<dyn Throttle>,
}

impl Resilient {
    pub fn new(name: impl Into<String>, cfg: ResilienceConfig) -> Self {
        let name = name.into();
        Self {
            breaker: CircuitBreaker::new(name.clone(), cfg.breaker),
            throttle: Arc::new(RateLimiter::new(cfg.rate_limit)),
            retry: cfg.retry,
            name,
        }
    }

    /// Swap the token bucket for another throttle (e.g. an `IntervalLimiter`).
    pub fn with_throttle(mut self, throttle: Arc<dyn Throttle>) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn breaker_snapshot(&self) -> CircuitBreakerSnapshot {
        self.breaker.snapshot()
    }

    /// Invoke `op` through all three layers.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let op = &op;
        self.retry.run(move || self.attempt(op)).await
    }

    async fn attempt<T, F, Fut>(&self, op: &F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.breaker.allow()?;
        self.throttle.acquire().await?;
        match op().await {
            Ok(value) => {
                self.breaker.on_success();
                Ok(value)
            }
            Err(err) => {
                self.breaker.on_failure();
                Err(err)
            }
        }
    }
}

/// A service paired with the [`Resilient`] policies that protect it.
///
/// Service traits implement themselves for `Guarded<S>` by routing each call
/// through [`Guarded::call`], so a protected service can stand in anywhere an
/// unprotected one is accepted.
pub struct Guarded<S> {
    inner: S,
    policy: Resilient,
}

impl<S> Guarded<S> {
    pub fn new(inner: S, policy: Resilient) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn policy(&self) -> &Resilient {
        &self.policy
    }

    /// Run `f` against the inner service under the policies.
    pub async fn call<'a, T, F, Fut>(&'a self, f: F) -> Result<T>
    where
        F: Fn(&'a S) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let inner = &self.inner;
        self.policy.call(|| f(inner)).await
    }
}
