//! Weekly export of owned domains.

use super::{mean_valuation, report};
use crate::context::AppContext;
use crate::scheduler::Job;
use crate::store::DomainStatus;
use crate::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub struct PortfolioJob {
    ctx: Arc<AppContext>,
}

impl PortfolioJob {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// `{data_dir}/portfolio_{YYYY-MM-DD}.csv`
    pub fn export_path(&self, date: NaiveDate) -> PathBuf {
        self.ctx
            .settings
            .data_dir
            .join(format!("portfolio_{}.csv", date.format("%Y-%m-%d")))
    }

    /// Write the export for today's date in the configured timezone.
    pub async fn execute(&self) -> Result<usize> {
        let today = Utc::now().with_timezone(&self.ctx.settings.timezone()?).date_naive();
        self.export(today).await
    }

    /// Owned domains with at least one valuation, one row each.
    pub async fn export(&self, date: NaiveDate) -> Result<usize> {
        let owned = self.ctx.store.domains_with_status(DomainStatus::Owned).await?;
        let mut csv = String::from("domain,estimated_value\n");
        let mut rows = 0;
        for domain in &owned {
            let valuations = self.ctx.store.valuations(domain.id).await?;
            if let Some(value) = mean_valuation(&valuations) {
                let _ = writeln!(csv, "{},{:.2}", domain.name, value);
                rows += 1;
            }
        }

        let path = self.export_path(date);
        tokio::fs::create_dir_all(&self.ctx.settings.data_dir).await?;
        tokio::fs::write(&path, csv).await?;
        info!(rows, path = %path.display(), "exported portfolio");
        report(&self.ctx, super::PORTFOLIO, rows).await;
        Ok(rows)
    }
}

#[async_trait]
impl Job for PortfolioJob {
    async fn run(&self) -> Result<()> {
        self.execute().await.map(|_| ())
    }
}
