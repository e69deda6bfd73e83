use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Something that paces calls to an external resource.
#[async_trait]
pub trait Throttle: Send + Sync {
    /// Wait until one more call may proceed.
    async fn acquire(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct RateLimiterSnapshot {
    pub rate: f64,
    pub capacity: f64,
    pub tokens: f64,
    /// Estimated wait time until a token is available (ms), if currently empty.
    pub estimated_wait_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Tokens per second.
    pub rate: f64,
    /// Maximum number of tokens the bucket holds (burst size).
    pub capacity: f64,
}

impl RateLimiterConfig {
    pub fn from_rate(rate: f64) -> Option<Self> {
        if !rate.is_finite() || rate < 0.0 {
            return None;
        }
        Some(Self {
            rate,
            capacity: rate.max(1.0), // default burst: 1 second worth, at least 1
        })
    }

    /// `max_calls` per `period`, bursting up to `max_calls`.
    pub fn per_period(max_calls: u32, period: Duration) -> Option<Self> {
        let secs = period.as_secs_f64();
        if max_calls == 0 || secs <= 0.0 {
            return None;
        }
        Some(Self {
            rate: max_calls as f64 / secs,
            capacity: max_calls as f64,
        })
    }

    /// Create a new config with default values
    pub fn new() -> Self {
        Self {
            rate: 5.0,
            capacity: 5.0,
        }
    }

    /// Set the maximum tokens (burst size)
    pub fn with_capacity(mut self, tokens: u32) -> Self {
        self.capacity = tokens as f64;
        self
    }

    /// Set the refill rate (tokens per second)
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct State {
    tokens: f64,
    last: Instant,
}

/// Token-bucket rate limiter.
///
/// The bucket starts full. Each acquire refills by elapsed time times `rate`,
/// capped at `capacity`, then debits. Waiters sleep outside the lock and retry,
/// so there is no FIFO ordering between concurrent callers.
pub struct RateLimiter {
    cfg: RateLimiterConfig,
    state: Mutex<State>,
}

impl RateLimiter {
    pub fn new(cfg: RateLimiterConfig) -> Self {
        let capacity = cfg.capacity;
        let state = Mutex::new(State {
            tokens: capacity,
            last: Instant::now(),
        });
        Self { cfg, state }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.cfg
    }

    fn refill_locked(cfg: &RateLimiterConfig, st: &mut State) {
        let now = Instant::now();
        let elapsed = now.duration_since(st.last).as_secs_f64();
        if elapsed > 0.0 {
            st.tokens = (st.tokens + elapsed * cfg.rate).min(cfg.capacity);
            st.last = now;
        }
    }

    fn unlimited(&self) -> bool {
        self.cfg.rate <= 0.0
    }

    /// Acquire `n` tokens, sleeping until they are available.
    pub async fn acquire_n(&self, n: u32) -> Result<()> {
        if self.unlimited() {
            return Ok(());
        }
        let wanted = n as f64;
        if wanted > self.cfg.capacity {
            return Err(Error::validation_with_context(
                format!(
                    "requested {} tokens but bucket capacity is {}",
                    n, self.cfg.capacity
                ),
                ErrorContext::new().with_source("rate_limiter"),
            ));
        }

        loop {
            let wait = {
                let mut st = self.state.lock().await;
                Self::refill_locked(&self.cfg, &mut st);
                if st.tokens >= wanted {
                    st.tokens -= wanted;
                    return Ok(());
                }
                Duration::from_secs_f64((wanted - st.tokens) / self.cfg.rate)
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Try to acquire `n` tokens without waiting, returns true if successful
    pub async fn try_acquire(&self, n: u32) -> bool {
        if self.unlimited() {
            return true;
        }
        let mut st = self.state.lock().await;
        Self::refill_locked(&self.cfg, &mut st);

        let wanted = n as f64;
        if st.tokens >= wanted {
            st.tokens -= wanted;
            true
        } else {
            false
        }
    }

    pub async fn snapshot(&self) -> RateLimiterSnapshot {
        let cfg = &self.cfg;
        let mut st = self.state.lock().await;

        let mut wait_ms = None;
        if cfg.rate > 0.0 {
            Self::refill_locked(cfg, &mut st);
            if st.tokens < 1.0 {
                let missing = 1.0 - st.tokens;
                wait_ms = Some((missing / cfg.rate * 1000.0).ceil() as u64);
            }
        }

        RateLimiterSnapshot {
            rate: cfg.rate,
            capacity: cfg.capacity,
            tokens: st.tokens,
            estimated_wait_ms: wait_ms,
        }
    }
}

#[async_trait]
impl Throttle for RateLimiter {
    async fn acquire(&self) -> Result<()> {
        self.acquire_n(1).await
    }
}

/// Interval-spacing limiter: at most one call per `interval`.
///
/// The lock is held across the wait, so calls are strictly serialized.
pub struct IntervalLimiter {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl IntervalLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// Spacing equivalent to `max_calls` per `period`.
    pub fn per_period(max_calls: u32, period: Duration) -> Self {
        Self::new(period / max_calls.max(1))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl Throttle for IntervalLimiter {
    async fn acquire(&self) -> Result<()> {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_rate_limiter_config_from_rate() {
        let config = RateLimiterConfig::from_rate(10.0).unwrap();
        assert_eq!(config.rate, 10.0);
        assert_eq!(config.capacity, 10.0);
    }

    #[test]
    fn test_rate_limiter_config_from_rate_low() {
        let config = RateLimiterConfig::from_rate(0.5).unwrap();
        assert_eq!(config.rate, 0.5);
        // capacity should be at least 1.0
        assert_eq!(config.capacity, 1.0);
    }

    #[test]
    fn test_rate_limiter_config_from_rate_invalid() {
        assert!(RateLimiterConfig::from_rate(-1.0).is_none());
        assert!(RateLimiterConfig::from_rate(f64::NAN).is_none());
        assert!(RateLimiterConfig::from_rate(f64::INFINITY).is_none());
    }

    #[test]
    fn test_rate_limiter_config_per_period() {
        let config = RateLimiterConfig::per_period(5, Duration::from_secs(1)).unwrap();
        assert_eq!(config.rate, 5.0);
        assert_eq!(config.capacity, 5.0);
        assert!(RateLimiterConfig::per_period(0, Duration::from_secs(1)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_wait() {
        let limiter = RateLimiter::new(RateLimiterConfig::new().with_capacity(3).with_rate(10.0));

        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await.unwrap();
        }
        assert_eq!(start.elapsed(), Duration::ZERO);

        limiter.acquire().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(start.elapsed() < Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_try_acquire_drains_bucket() {
        let limiter = RateLimiter::new(RateLimiterConfig::new().with_capacity(3).with_rate(1.0));

        assert!(limiter.try_acquire(2).await);
        assert!(limiter.try_acquire(1).await);
        assert!(!limiter.try_acquire(1).await);
    }

    #[tokio::test]
    async fn test_acquire_more_than_capacity_is_rejected() {
        let limiter = RateLimiter::new(RateLimiterConfig::new().with_capacity(2));
        let err = limiter.acquire_n(3).await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn test_zero_rate_is_unlimited() {
        let limiter = RateLimiter::new(RateLimiterConfig::from_rate(0.0).unwrap());
        for _ in 0..100 {
            assert!(limiter.try_acquire(1).await);
        }
        assert!(limiter.acquire().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_never_exceed_capacity() {
        let limiter = RateLimiter::new(RateLimiterConfig::new().with_capacity(4).with_rate(100.0));
        limiter.acquire_n(2).await.unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;

        let snapshot = limiter.snapshot().await;
        assert_eq!(snapshot.tokens, 4.0);
        assert!(snapshot.estimated_wait_ms.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquirers_never_go_negative() {
        let limiter = Arc::new(RateLimiter::new(
            RateLimiterConfig::new().with_capacity(2).with_rate(20.0),
        ));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.acquire().await.unwrap();
                limiter.snapshot().await.tokens
            }));
        }
        for h in handles {
            let tokens = h.await.unwrap();
            assert!(tokens >= 0.0);
            assert!(tokens <= 2.0);
        }
    }

    #[tokio::test]
    async fn test_snapshot_reports_wait_when_empty() {
        let limiter = RateLimiter::new(RateLimiterConfig::new().with_capacity(1).with_rate(2.0));
        assert!(limiter.try_acquire(1).await);

        let snapshot = limiter.snapshot().await;
        assert_eq!(snapshot.rate, 2.0);
        assert_eq!(snapshot.capacity, 1.0);
        let wait = snapshot.estimated_wait_ms.unwrap();
        assert!(wait > 0 && wait <= 500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_limiter_spaces_calls() {
        let limiter = IntervalLimiter::per_period(5, Duration::from_secs(1));
        assert_eq!(limiter.interval(), Duration::from_millis(200));

        let start = Instant::now();
        limiter.acquire().await.unwrap();
        limiter.acquire().await.unwrap();
        limiter.acquire().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(400));
        assert!(start.elapsed() < Duration::from_millis(450));
    }
}
