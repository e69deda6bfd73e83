//! # Resilience Primitives Module
//!
//! Call-wrapping policies for unreliable downstream services (WHOIS lookups,
//! valuation APIs, marketplace uploads).
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`rate_limiter`] | Token bucket and interval-spacing throttles |
//! | [`retry`] | Bounded retry with `backoff × attempt` delays |
//! | [`circuit_breaker`] | Consecutive-failure breaker with lazy reset |
//! | [`wrapper`] | [`Resilient`] composition and the [`Guarded`] service wrapper |
//!
//! ## Composition
//!
//! Layers apply from outermost to innermost as
//! retry ⊃ circuit breaker ⊃ rate limiter ⊃ operation:
//!
//! ```rust
//! use domain_pipeline::resilience::{Resilient, ResilienceConfig, RetryPolicy};
//! use domain_pipeline::resilience::circuit_breaker::CircuitBreakerConfig;
//! use domain_pipeline::resilience::rate_limiter::RateLimiterConfig;
//! use std::time::Duration;
//!
//! # async fn demo() -> domain_pipeline::Result<()> {
//! let whois = Resilient::new(
//!     "whois",
//!     ResilienceConfig::new()
//!         .with_rate_limit(RateLimiterConfig::new().with_capacity(5).with_rate(5.0))
//!         .with_breaker(
//!             CircuitBreakerConfig::new()
//!                 .with_max_failures(5)
//!                 .with_reset_timeout(Duration::from_secs(60)),
//!         )
//!         .with_retry(RetryPolicy::new(3, Duration::from_secs(1))),
//! );
//!
//! let available = whois.call(|| async { Ok(true) }).await?;
//! # let _ = available;
//! # Ok(())
//! # }
//! ```
//!
//! A rejected call surfaces as [`crate::Error::CircuitOpen`], distinct from
//! the operation's own failures.

pub mod circuit_breaker;
pub mod rate_limiter;
pub mod retry;
pub mod wrapper;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use rate_limiter::{IntervalLimiter, RateLimiter, RateLimiterConfig, Throttle};
pub use retry::{ResiliencePolicy, RetryPolicy};
pub use wrapper::{Guarded, ResilienceConfig, Resilient};
