//! # domain-pipeline
//!
//! Scheduled pipeline that discovers trending phrases, turns them into
//! candidate domain names and carries each candidate through availability
//! checks, valuation, monitoring, backordering and marketplace listing.
//!
//! ## Overview
//!
//! The crate is built around three pieces:
//!
//! - **Resilience**: every call to an external service goes through a
//!   [`resilience::Resilient`] wrapper (retry ⊃ circuit breaker ⊃ rate limiter).
//! - **Scheduling**: an in-process [`scheduler::Scheduler`] fires interval and
//!   cron jobs, isolating failures and panics per job.
//! - **Live updates**: a [`broadcast::Broadcaster`] fans out JSON events to
//!   connected subscribers, dropping any that fail.
//!
//! Jobs share state through an explicit [`context::AppContext`] rather than
//! process-wide singletons.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use domain_pipeline::config::Settings;
//! use domain_pipeline::context::AppContext;
//! use domain_pipeline::scheduler::Scheduler;
//! use domain_pipeline::stages::{register_pipeline, PipelineServices};
//!
//! #[tokio::main]
//! async fn main() -> domain_pipeline::Result<()> {
//!     let settings = Settings::load(None)?;
//!     domain_pipeline::logging::init(&settings);
//!
//!     let scheduler = Scheduler::from_settings(&settings)?;
//!     let services = PipelineServices::offline(&settings.resilience);
//!     let ctx = AppContext::from_settings(settings).await?;
//!     register_pipeline(&scheduler, ctx, services)?;
//!     scheduler.start()?;
//!     # Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`resilience`] | Token bucket, retry, circuit breaker and their composition |
//! | [`scheduler`] | Interval/cron job scheduler |
//! | [`broadcast`] | Live-update fan-out |
//! | [`cache`] | Disk-backed memoization cache |
//! | [`store`] | Pipeline state repository |
//! | [`stages`] | The eight scheduled pipeline jobs |
//! | [`config`] | Layered settings (defaults, YAML, environment) |

pub mod broadcast;
pub mod cache;
pub mod config;
pub mod context;
pub mod logging;
pub mod resilience;
pub mod scheduler;
pub mod stages;
pub mod store;

pub use broadcast::{event_message, BroadcastReport, Broadcaster, Subscriber};
pub use config::Settings;
pub use context::AppContext;
pub use resilience::{Guarded, ResilienceConfig, Resilient};
pub use scheduler::{Job, Scheduler, Trigger};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
