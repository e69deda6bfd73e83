use crate::{Error, ErrorContext, Result};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through; failures are counted.
    Closed,
    /// Calls are rejected without reaching the protected operation.
    Open,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerSnapshot {
    pub max_failures: u32,
    pub reset_timeout_ms: u64,
    pub consecutive_failures: u32,
    /// Remaining open time in ms, if currently open.
    pub open_remaining_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub max_failures: u32,
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of consecutive failures that opens the breaker
    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures.max(1);
        self
    }

    /// Set how long the breaker stays open
    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }
}

#[derive(Debug)]
struct State {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Consecutive-failure circuit breaker for a single protected operation.
///
/// - Opens once `max_failures` consecutive failures are recorded
/// - While open, [`allow`](CircuitBreaker::allow) fails fast with [`Error::CircuitOpen`]
/// - There is no background timer: the first `allow` after `reset_timeout`
///   closes the breaker and clears the failure count
pub struct CircuitBreaker {
    name: String,
    cfg: CircuitBreakerConfig,
    state: std::sync::Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, cfg: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            cfg,
            state: std::sync::Mutex::new(State {
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| {
            Error::runtime_with_context(
                "CircuitBreaker poisoned",
                ErrorContext::new()
                    .with_source("circuit_breaker")
                    .with_details(self.name.clone()),
            )
        })
    }

    /// Gate a call. Errors with [`Error::CircuitOpen`] while the cooldown runs.
    pub fn allow(&self) -> Result<()> {
        let mut st = self.lock()?;
        if let Some(opened_at) = st.opened_at {
            let elapsed = opened_at.elapsed();
            if elapsed < self.cfg.reset_timeout {
                return Err(Error::CircuitOpen {
                    resource: self.name.clone(),
                    retry_in_ms: (self.cfg.reset_timeout - elapsed).as_millis() as u64,
                });
            }
            st.opened_at = None;
            st.consecutive_failures = 0;
            info!(resource = %self.name, "circuit breaker closed after cooldown");
        }
        Ok(())
    }

    pub fn on_success(&self) {
        if let Ok(mut st) = self.state.lock() {
            st.consecutive_failures = 0;
        }
    }

    pub fn on_failure(&self) {
        if let Ok(mut st) = self.state.lock() {
            st.consecutive_failures = st.consecutive_failures.saturating_add(1);
            if st.opened_at.is_none() && st.consecutive_failures >= self.cfg.max_failures {
                st.opened_at = Some(Instant::now());
                warn!(
                    resource = %self.name,
                    failures = st.consecutive_failures,
                    cooldown_ms = self.cfg.reset_timeout.as_millis() as u64,
                    "circuit breaker opened"
                );
            }
        }
    }

    /// Current state without triggering the lazy reset.
    pub fn state(&self) -> CircuitState {
        match self.snapshot().open_remaining_ms {
            Some(_) => CircuitState::Open,
            None => CircuitState::Closed,
        }
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let (consecutive_failures, open_remaining_ms) = match self.state.lock() {
            Ok(st) => {
                let remaining = st.opened_at.and_then(|opened_at| {
                    let elapsed = opened_at.elapsed();
                    (elapsed < self.cfg.reset_timeout)
                        .then(|| (self.cfg.reset_timeout - elapsed).as_millis() as u64)
                });
                (st.consecutive_failures, remaining)
            }
            Err(_) => (0, None),
        };
        CircuitBreakerSnapshot {
            max_failures: self.cfg.max_failures,
            reset_timeout_ms: self.cfg.reset_timeout.as_millis() as u64,
            consecutive_failures,
            open_remaining_ms,
        }
    }
}
