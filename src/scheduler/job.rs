//! Job trait and per-job scheduling state.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use futures::FutureExt;
use tokio::time::Instant;
use tracing::{debug, error, info};

use super::clock::WallClock;
use super::trigger::Trigger;
use crate::Result;

/// A unit of scheduled work.
#[async_trait]
pub trait Job: Send + Sync {
    async fn run(&self) -> Result<()>;
}

/// Adapter turning an async closure into a [`Job`].
pub struct FnJob<F>(F);

#[async_trait]
impl<F, Fut> Job for FnJob<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn run(&self) -> Result<()> {
        (self.0)().await
    }
}

pub fn job_fn<F, Fut>(f: F) -> Arc<dyn Job>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnJob(f))
}

/// Point-in-time view of a registered job.
#[derive(Debug, Clone)]
pub struct JobInfo {
    pub id: String,
    pub trigger: String,
    pub enabled: bool,
    pub running: bool,
    pub runs: u64,
    pub failures: u64,
    /// Fires dropped because the previous run had not finished.
    pub skipped: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    /// Error of the most recent run, if it failed.
    pub last_error: Option<String>,
    pub next_run_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct JobStats {
    last_run_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    next_run_at: Option<DateTime<Utc>>,
}

/// One scheduled fire: monotonic deadline plus its wall-clock equivalent.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fire {
    pub at: Instant,
    pub wall: DateTime<Utc>,
}

pub(crate) struct JobEntry {
    pub id: String,
    pub trigger: Trigger,
    job: Arc<dyn Job>,
    enabled: AtomicBool,
    running: AtomicBool,
    runs: AtomicU64,
    failures: AtomicU64,
    skipped: AtomicU64,
    registered_at: Instant,
    clock: Arc<dyn WallClock>,
    stats: Mutex<JobStats>,
}

impl JobEntry {
    pub fn new(id: String, trigger: Trigger, job: Arc<dyn Job>, clock: Arc<dyn WallClock>) -> Self {
        Self {
            id,
            trigger,
            job,
            enabled: AtomicBool::new(true),
            running: AtomicBool::new(false),
            runs: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            registered_at: Instant::now(),
            clock,
            stats: Mutex::new(JobStats::default()),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// The fire following `previous` (or the first one after registration).
    ///
    /// Interval fires stay anchored to the registration instant; fires that
    /// were missed entirely are coalesced into the next future slot.
    pub fn next_fire(&self, previous: Option<Fire>, tz: FixedOffset) -> Option<Fire> {
        let now = Instant::now();
        let wall_now = self.clock.now();
        let fire = match &self.trigger {
            Trigger::Interval(period) => {
                let mut at = previous.map(|p| p.at).unwrap_or(self.registered_at) + *period;
                if at <= now {
                    let behind = now.duration_since(at).as_nanos() / period.as_nanos().max(1);
                    let missed = u32::try_from(behind + 1).unwrap_or(u32::MAX);
                    at += period.saturating_mul(missed);
                    debug!(job = %self.id, missed, "coalescing missed interval fires");
                }
                let wall = wall_now
                    + chrono::Duration::from_std(at.duration_since(now)).unwrap_or_else(|_| chrono::Duration::zero());
                Fire { at, wall }
            }
            Trigger::Cron(cron) => {
                // never fire the same scheduled minute twice, even if the
                // timer woke slightly before the wall clock reached it
                let from = match previous {
                    Some(p) if p.wall > wall_now => p.wall,
                    _ => wall_now,
                };
                let wall = cron.next_after(from, tz)?;
                let delay = (wall - wall_now).to_std().unwrap_or(Duration::ZERO);
                Fire {
                    at: now + delay,
                    wall,
                }
            }
        };
        if let Ok(mut stats) = self.stats.lock() {
            stats.next_run_at = Some(fire.wall);
        }
        Some(fire)
    }

    /// Start a run unless the job is disabled or the previous run is still going.
    pub fn fire(self: &Arc<Self>) {
        if !self.enabled.load(Ordering::Acquire) {
            debug!(job = %self.id, "job disabled; fire ignored");
            return;
        }
        if self.running.swap(true, Ordering::AcqRel) {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            info!(job = %self.id, "previous run still in progress; skipping this fire");
            return;
        }
        let entry = Arc::clone(self);
        tokio::spawn(async move { entry.run_once().await });
    }

    async fn run_once(&self) {
        let started = Instant::now();
        let started_at = self.clock.now();
        debug!(job = %self.id, "job started");

        let outcome = AssertUnwindSafe(self.job.run()).catch_unwind().await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let failure = match outcome {
            Ok(Ok(())) => {
                debug!(job = %self.id, elapsed_ms, "job finished");
                None
            }
            Ok(Err(err)) => {
                error!(
                    job = %self.id,
                    elapsed_ms,
                    error = %err,
                    detail = ?err,
                    "scheduled job failed"
                );
                Some(err.to_string())
            }
            Err(panic) => {
                let msg = panic_message(panic.as_ref());
                error!(job = %self.id, elapsed_ms, panic = %msg, "scheduled job panicked");
                Some(format!("panic: {msg}"))
            }
        };

        self.runs.fetch_add(1, Ordering::Relaxed);
        if failure.is_some() {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        if let Ok(mut stats) = self.stats.lock() {
            stats.last_run_at = Some(started_at);
            stats.last_error = failure;
        }
        self.running.store(false, Ordering::Release);
    }

    pub fn info(&self) -> JobInfo {
        let (last_run_at, last_error, next_run_at) = match self.stats.lock() {
            Ok(s) => (s.last_run_at, s.last_error.clone(), s.next_run_at),
            Err(_) => (None, None, None),
        };
        JobInfo {
            id: self.id.clone(),
            trigger: self.trigger.to_string(),
            enabled: self.enabled.load(Ordering::Acquire),
            running: self.running.load(Ordering::Acquire),
            runs: self.runs.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            last_run_at,
            last_error,
            next_run_at,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
