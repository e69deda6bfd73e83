//! [`Scheduler`]: owns registered jobs and drives their triggers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{FixedOffset, Offset, Utc};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::clock::{SystemClock, WallClock};
use super::job::{Fire, Job, JobEntry, JobInfo};
use super::trigger::Trigger;
use crate::config::Settings;
use crate::{Error, ErrorContext, Result};

/// In-process job scheduler.
///
/// Every job gets its own driver task that sleeps until the next fire time.
/// A fire spawns the job body as a separate task, so a slow job never delays
/// another job's trigger. A job never overlaps itself: a fire that arrives
/// while the previous run is still going is skipped and counted.
///
/// Failures and panics inside a job are caught, logged with the job id and
/// counted; they never stop the scheduler or affect other jobs.
///
/// [`shutdown`](Scheduler::shutdown) stops all driver tasks without waiting
/// for in-flight runs. Dropping the scheduler does the same.
pub struct Scheduler {
    tz: FixedOffset,
    clock: Arc<dyn WallClock>,
    jobs: Mutex<BTreeMap<String, Arc<JobEntry>>>,
    started: AtomicBool,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(tz: FixedOffset) -> Self {
        Self {
            tz,
            clock: Arc::new(SystemClock),
            jobs: Mutex::new(BTreeMap::new()),
            started: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(settings.timezone()?))
    }

    /// Replace the wall clock used for cron fires and run timestamps.
    /// Jobs registered earlier keep the clock they were registered with.
    pub fn with_clock(mut self, clock: Arc<dyn WallClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn timezone(&self) -> FixedOffset {
        self.tz
    }

    fn lock_jobs(&self) -> Result<MutexGuard<'_, BTreeMap<String, Arc<JobEntry>>>> {
        self.jobs.lock().map_err(|_| {
            Error::runtime_with_context(
                "job table poisoned",
                ErrorContext::new().with_source("scheduler"),
            )
        })
    }

    /// Add a job. If the scheduler is already running the job starts
    /// counting towards its first fire immediately.
    pub fn register(&self, id: impl Into<String>, trigger: Trigger, job: Arc<dyn Job>) -> Result<()> {
        let id = id.into();
        if let Trigger::Interval(period) = &trigger {
            if period.is_zero() {
                return Err(Error::validation_with_context(
                    "interval trigger period must be non-zero",
                    ErrorContext::new().with_field_path(&id).with_source("scheduler"),
                ));
            }
        }

        let (entry, running) = {
            let mut jobs = self.lock_jobs()?;
            if jobs.contains_key(&id) {
                return Err(Error::configuration_with_context(
                    format!("job '{id}' is already registered"),
                    ErrorContext::new().with_field_path(&id).with_source("scheduler"),
                ));
            }
            let entry = Arc::new(JobEntry::new(id.clone(), trigger, job, Arc::clone(&self.clock)));
            jobs.insert(id.clone(), Arc::clone(&entry));
            (entry, self.is_running())
        };
        info!(job = %id, trigger = %entry.trigger, "job registered");

        if running {
            let handle = Handle::try_current().map_err(runtime_missing)?;
            self.spawn_driver(&handle, entry);
        }
        Ok(())
    }

    /// Begin firing jobs. Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::runtime_with_context(
                "scheduler has been shut down",
                ErrorContext::new().with_source("scheduler"),
            ));
        }
        let handle = Handle::try_current().map_err(runtime_missing)?;
        let entries: Vec<Arc<JobEntry>> = {
            let jobs = self.lock_jobs()?;
            if self.started.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
            jobs.values().cloned().collect()
        };
        info!(jobs = entries.len(), tz = %self.tz, "scheduler started");
        for entry in entries {
            self.spawn_driver(&handle, entry);
        }
        Ok(())
    }

    /// Stop scheduling new runs. Runs already in progress finish on their own.
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            self.cancel.cancel();
            info!("scheduler shut down");
        }
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire) && !self.cancel.is_cancelled()
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let jobs = self.lock_jobs()?;
        let entry = jobs.get(id).ok_or_else(|| unknown_job(id))?;
        entry.set_enabled(enabled);
        info!(job = %id, enabled, "job toggled");
        Ok(())
    }

    pub fn job(&self, id: &str) -> Option<JobInfo> {
        self.lock_jobs().ok()?.get(id).map(|e| e.info())
    }

    /// All registered jobs, ordered by id.
    pub fn jobs(&self) -> Vec<JobInfo> {
        match self.lock_jobs() {
            Ok(jobs) => jobs.values().map(|e| e.info()).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn spawn_driver(&self, handle: &Handle, entry: Arc<JobEntry>) {
        let cancel = self.cancel.child_token();
        let tz = self.tz;
        handle.spawn(drive(entry, tz, cancel));
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn drive(entry: Arc<JobEntry>, tz: FixedOffset, cancel: CancellationToken) {
    let mut previous: Option<Fire> = None;
    loop {
        let Some(fire) = entry.next_fire(previous, tz) else {
            debug!(job = %entry.id, "trigger has no further fire times");
            return;
        };
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(job = %entry.id, "driver stopped");
                return;
            }
            _ = tokio::time::sleep_until(fire.at) => {}
        }
        entry.fire();
        previous = Some(fire);
    }
}

fn runtime_missing(e: tokio::runtime::TryCurrentError) -> Error {
    Error::runtime_with_context(
        "scheduler requires a Tokio runtime",
        ErrorContext::new()
            .with_details(e.to_string())
            .with_source("scheduler"),
    )
}

fn unknown_job(id: &str) -> Error {
    Error::validation_with_context(
        format!("no job named '{id}'"),
        ErrorContext::new().with_field_path(id).with_source("scheduler"),
    )
}
