//! Availability checks for newly generated domains.

use super::report;
use crate::context::AppContext;
use crate::resilience::Guarded;
use crate::scheduler::Job;
use crate::store::DomainStatus;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// WHOIS-style registration lookup.
#[async_trait]
pub trait AvailabilityChecker: Send + Sync {
    async fn is_available(&self, domain: &str) -> Result<bool>;
}

#[async_trait]
impl<C: AvailabilityChecker> AvailabilityChecker for Guarded<C> {
    async fn is_available(&self, domain: &str) -> Result<bool> {
        self.call(|checker| checker.is_available(domain)).await
    }
}

/// Reports every domain as available.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticAvailability;

#[async_trait]
impl AvailabilityChecker for StaticAvailability {
    async fn is_available(&self, _domain: &str) -> Result<bool> {
        Ok(true)
    }
}

pub struct AvailabilityJob {
    ctx: Arc<AppContext>,
    checker: Arc<dyn AvailabilityChecker>,
}

impl AvailabilityJob {
    pub fn new(ctx: Arc<AppContext>, checker: Arc<dyn AvailabilityChecker>) -> Self {
        Self { ctx, checker }
    }

    /// Check every `new` domain. Returns how many were resolved.
    ///
    /// A failed lookup leaves the domain `new` for the next run. Once the
    /// checker's breaker is open the rest of the batch is deferred too.
    pub async fn execute(&self) -> Result<usize> {
        let pending = self.ctx.store.domains_with_status(DomainStatus::New).await?;
        let mut checked = 0;
        for domain in &pending {
            let available = match self.checker.is_available(&domain.name).await {
                Ok(available) => available,
                Err(e) if e.is_circuit_open() => {
                    warn!(domain = %domain.name, error = %e, "availability checks paused");
                    break;
                }
                Err(e) => {
                    warn!(domain = %domain.name, error = %e, "availability check failed");
                    continue;
                }
            };
            self.ctx.store.record_availability(domain.id, available).await?;
            let status = if available {
                DomainStatus::Available
            } else {
                DomainStatus::Taken
            };
            self.ctx.store.set_status(domain.id, status).await?;
            checked += 1;
        }
        info!(pending = pending.len(), checked, "checked availability");
        report(&self.ctx, super::AVAILABILITY, checked).await;
        Ok(checked)
    }
}

#[async_trait]
impl Job for AvailabilityJob {
    async fn run(&self) -> Result<()> {
        self.execute().await.map(|_| ())
    }
}
