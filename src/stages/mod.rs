//! The eight scheduled pipeline stages.
//!
//! | Stage | Trigger | Moves domains |
//! |-------|---------|---------------|
//! | [`TREND_DISCOVERY`] | every 60 min | seeds phrases |
//! | [`DOMAIN_GENERATOR`] | every 60 min | phrases → `new` |
//! | [`AVAILABILITY`] | every 60 min | `new` → `available` / `taken` |
//! | [`VALUATION`] | every 120 min | `available` → `valuated` |
//! | [`MONITORING`] | every 1440 min | `valuated` → `monitoring` |
//! | [`BACKORDERING`] | daily 00:00 | `monitoring` → `backordered` |
//! | [`PORTFOLIO`] | Sunday 00:00 | exports `owned` |
//! | [`MONETIZATION`] | Monday 01:00 | `backordered` → `listed` |
//!
//! Every stage logs a summary count and broadcasts `{"type": stage, "data": {"count": n}}`.

mod availability;
mod backorder;
mod generator;
mod monetization;
mod monitoring;
mod portfolio;
mod trends;
mod valuation;

pub use availability::{AvailabilityChecker, AvailabilityJob, StaticAvailability};
pub use backorder::{BackorderJob, BACKORDER_PROVIDER};
pub use generator::{candidate_label, generate_domains, is_valid_label, DomainGeneratorJob};
pub use monetization::{sedo_row, MonetizationJob, MARKETPLACE, SEDO_UPLOAD_FILE};
pub use monitoring::{
    MonitorService, MonitoringJob, StaticMonitorService, FREE_DOMAIN_ALERTS, MONITOR_CAPS, UPTIME_ROBOT,
};
pub use portfolio::PortfolioJob;
pub use trends::{StaticTrendSource, TrendDiscoveryJob, TrendSource};
pub use valuation::{HttpValuationService, StaticValuation, ValuationJob, ValuationService};

use crate::config::ResilienceSettings;
use crate::context::AppContext;
use crate::resilience::{Guarded, ResilienceConfig, Resilient};
use crate::scheduler::{CronSpec, Scheduler, Trigger};
use crate::store::Valuation;
use crate::Result;
use chrono::Weekday;
use std::sync::Arc;
use tracing::{debug, info};

pub const TREND_DISCOVERY: &str = "trend_discovery";
pub const DOMAIN_GENERATOR: &str = "domain_generator";
pub const AVAILABILITY: &str = "availability";
pub const VALUATION: &str = "valuation";
pub const MONITORING: &str = "monitoring";
pub const BACKORDERING: &str = "backordering";
pub const PORTFOLIO: &str = "portfolio";
pub const MONETIZATION: &str = "monetization";

/// External services the stages call.
pub struct PipelineServices {
    pub trends: Arc<dyn TrendSource>,
    pub availability: Arc<dyn AvailabilityChecker>,
    pub valuations: Vec<Arc<dyn ValuationService>>,
    pub monitors: Arc<dyn MonitorService>,
}

impl PipelineServices {
    pub fn new(
        trends: Arc<dyn TrendSource>,
        availability: Arc<dyn AvailabilityChecker>,
        valuations: Vec<Arc<dyn ValuationService>>,
        monitors: Arc<dyn MonitorService>,
    ) -> Self {
        Self {
            trends,
            availability,
            valuations,
            monitors,
        }
    }

    /// Deterministic stand-ins, each external call guarded by its own
    /// limiter, breaker and retry policy.
    pub fn offline(settings: &ResilienceSettings) -> Self {
        let cfg = ResilienceConfig::from_settings(settings);
        let availability = Guarded::new(StaticAvailability, Resilient::new(AVAILABILITY, cfg.clone()));
        let valuations = StaticValuation::defaults()
            .into_iter()
            .map(|service| {
                let policy = Resilient::new(format!("valuation:{}", service.name()), cfg.clone());
                Arc::new(Guarded::new(service, policy)) as Arc<dyn ValuationService>
            })
            .collect();
        let monitors = Guarded::new(StaticMonitorService, Resilient::new(MONITORING, cfg));
        Self::new(
            Arc::new(StaticTrendSource::default()),
            Arc::new(availability),
            valuations,
            Arc::new(monitors),
        )
    }
}

/// Register all eight stages on `scheduler`.
pub fn register_pipeline(
    scheduler: &Scheduler,
    ctx: Arc<AppContext>,
    services: PipelineServices,
) -> Result<()> {
    let PipelineServices {
        trends,
        availability,
        valuations,
        monitors,
    } = services;

    scheduler.register(
        TREND_DISCOVERY,
        Trigger::every_minutes(60)?,
        Arc::new(TrendDiscoveryJob::new(ctx.clone(), trends)),
    )?;
    scheduler.register(
        DOMAIN_GENERATOR,
        Trigger::every_minutes(60)?,
        Arc::new(DomainGeneratorJob::new(ctx.clone())),
    )?;
    scheduler.register(
        AVAILABILITY,
        Trigger::every_minutes(60)?,
        Arc::new(AvailabilityJob::new(ctx.clone(), availability)),
    )?;
    scheduler.register(
        VALUATION,
        Trigger::every_minutes(120)?,
        Arc::new(ValuationJob::new(ctx.clone(), valuations)),
    )?;
    scheduler.register(
        MONITORING,
        Trigger::every_minutes(1440)?,
        Arc::new(MonitoringJob::new(ctx.clone(), monitors)),
    )?;
    scheduler.register(
        BACKORDERING,
        Trigger::cron(CronSpec::new().hour(0))?,
        Arc::new(BackorderJob::new(ctx.clone())),
    )?;
    scheduler.register(
        PORTFOLIO,
        Trigger::cron(CronSpec::new().day_of_week(Weekday::Sun).hour(0))?,
        Arc::new(PortfolioJob::new(ctx.clone())),
    )?;
    scheduler.register(
        MONETIZATION,
        Trigger::cron(CronSpec::new().day_of_week(Weekday::Mon).hour(1))?,
        Arc::new(MonetizationJob::new(ctx)),
    )?;

    info!(stages = 8, "pipeline registered");
    Ok(())
}

async fn report(ctx: &AppContext, stage: &str, count: usize) {
    let sent = ctx.notify(stage, serde_json::json!({ "count": count })).await;
    debug!(stage, delivered = sent.delivered, dropped = sent.dropped, "stage event sent");
}

fn mean_valuation(valuations: &[Valuation]) -> Option<f64> {
    if valuations.is_empty() {
        return None;
    }
    Some(valuations.iter().map(|v| v.value).sum::<f64>() / valuations.len() as f64)
}
