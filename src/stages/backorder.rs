//! Backorders for monitored domains.

use super::report;
use crate::context::AppContext;
use crate::scheduler::Job;
use crate::store::DomainStatus;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub const BACKORDER_PROVIDER: &str = "NoWinNoFee";

pub struct BackorderJob {
    ctx: Arc<AppContext>,
}

impl BackorderJob {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    pub async fn execute(&self) -> Result<usize> {
        let monitored = self.ctx.store.domains_with_status(DomainStatus::Monitoring).await?;
        for domain in &monitored {
            self.ctx.store.add_backorder(domain.id, BACKORDER_PROVIDER).await?;
            self.ctx.store.set_status(domain.id, DomainStatus::Backordered).await?;
        }
        info!(count = monitored.len(), provider = BACKORDER_PROVIDER, "backordered domains");
        report(&self.ctx, super::BACKORDERING, monitored.len()).await;
        Ok(monitored.len())
    }
}

#[async_trait]
impl Job for BackorderJob {
    async fn run(&self) -> Result<()> {
        self.execute().await.map(|_| ())
    }
}
