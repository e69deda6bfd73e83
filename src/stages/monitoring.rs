//! Expiry monitors on free-tier services.

use super::report;
use crate::context::AppContext;
use crate::resilience::Guarded;
use crate::scheduler::Job;
use crate::store::{Domain, DomainStatus};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const UPTIME_ROBOT: &str = "UptimeRobot";
pub const FREE_DOMAIN_ALERTS: &str = "FreeDomainAlerts";

/// Free-tier monitor caps per service.
pub const MONITOR_CAPS: [(&str, usize); 2] = [(UPTIME_ROBOT, 50), (FREE_DOMAIN_ALERTS, 20)];

/// Creates expiry monitors on an external monitoring service.
#[async_trait]
pub trait MonitorService: Send + Sync {
    /// Register `domain` on `service` and return the service's monitor reference.
    async fn create_monitor(&self, service: &str, domain: &Domain) -> Result<String>;
}

#[async_trait]
impl<S: MonitorService> MonitorService for Guarded<S> {
    async fn create_monitor(&self, service: &str, domain: &Domain) -> Result<String> {
        self.call(|monitors| monitors.create_monitor(service, domain)).await
    }
}

/// Accepts every monitor and answers with a `{service}-{domain id}` reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticMonitorService;

#[async_trait]
impl MonitorService for StaticMonitorService {
    async fn create_monitor(&self, service: &str, domain: &Domain) -> Result<String> {
        Ok(format!("{service}-{}", domain.id))
    }
}

pub struct MonitoringJob {
    ctx: Arc<AppContext>,
    monitors: Arc<dyn MonitorService>,
}

impl MonitoringJob {
    pub fn new(ctx: Arc<AppContext>, monitors: Arc<dyn MonitorService>) -> Self {
        Self { ctx, monitors }
    }

    /// Whether `domain` may get a monitor on `service`, evicting the
    /// lowest-valued one when the service is at its cap.
    async fn make_room(&self, domain: &Domain, service: &str, cap: usize) -> Result<bool> {
        let active = self.ctx.store.monitors(service).await?;
        if active.iter().any(|m| m.domain_id == domain.id) {
            return Ok(false);
        }
        if active.len() < cap {
            return Ok(true);
        }
        match self.ctx.store.drop_lowest_valued_monitor(service).await? {
            Some(dropped) => {
                debug!(service, domain_id = dropped.domain_id, "cap reached; dropped lowest-valued monitor");
                Ok(true)
            }
            None => {
                warn!(service, cap, domain = %domain.name, "cap reached and no valued monitor to evict; skipping");
                Ok(false)
            }
        }
    }

    /// Monitor every `valuated` domain. Returns how many moved to `monitoring`.
    ///
    /// A domain whose monitor creation fails stays `valuated`; monitors it
    /// already got are kept and not requested again. Once the service's
    /// breaker is open the rest of the batch is deferred.
    pub async fn execute(&self) -> Result<usize> {
        let valuated = self.ctx.store.domains_with_status(DomainStatus::Valuated).await?;
        let mut moved = 0;
        'domains: for domain in &valuated {
            for (service, cap) in MONITOR_CAPS {
                if !self.make_room(domain, service, cap).await? {
                    continue;
                }
                let monitor_ref = match self.monitors.create_monitor(service, domain).await {
                    Ok(monitor_ref) => monitor_ref,
                    Err(e) if e.is_circuit_open() => {
                        warn!(domain = %domain.name, service, error = %e, "monitor creation paused");
                        break 'domains;
                    }
                    Err(e) => {
                        warn!(domain = %domain.name, service, error = %e, "monitor creation failed");
                        continue 'domains;
                    }
                };
                self.ctx.store.add_monitor(domain.id, service, &monitor_ref).await?;
            }
            self.ctx.store.set_status(domain.id, DomainStatus::Monitoring).await?;
            moved += 1;
        }
        info!(pending = valuated.len(), moved, "monitoring domains");
        report(&self.ctx, super::MONITORING, moved).await;
        Ok(moved)
    }
}

#[async_trait]
impl Job for MonitoringJob {
    async fn run(&self) -> Result<()> {
        self.execute().await.map(|_| ())
    }
}
