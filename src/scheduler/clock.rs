//! Wall-clock sources for cron evaluation.

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Source of the current UTC time used to place cron fires.
pub trait WallClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall time derived from the tokio clock, anchored at a fixed start.
///
/// Advances together with `tokio::time`, including a paused test clock, so
/// cron triggers can be driven deterministically with `start_paused`.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    anchor: Instant,
    start: DateTime<Utc>,
}

impl TokioClock {
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            anchor: Instant::now(),
            start,
        }
    }
}

impl WallClock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.anchor.elapsed()).unwrap_or_else(|_| chrono::Duration::zero());
        self.start + elapsed
    }
}
