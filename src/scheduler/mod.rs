//! In-process job scheduling with interval and cron triggers.
//!
//! Jobs are registered on a [`Scheduler`] with a [`Trigger`]. Interval
//! triggers fire every period counted from registration; cron triggers fire on
//! wall-clock matches in the scheduler's timezone, read from a [`WallClock`].
//! Single-process only: job state is neither persisted nor shared between
//! processes.

mod clock;
mod core;
mod job;
mod trigger;

#[cfg(test)]
mod tests;

pub use self::clock::{SystemClock, TokioClock, WallClock};
pub use self::core::Scheduler;
pub use self::job::{job_fn, FnJob, Job, JobInfo};
pub use self::trigger::{CronSpec, CronTrigger, Trigger};
