//! Marketplace listings for backordered domains.

use super::{mean_valuation, report};
use crate::context::AppContext;
use crate::scheduler::Job;
use crate::store::DomainStatus;
use crate::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

pub const MARKETPLACE: &str = "Sedo";
pub const SEDO_UPLOAD_FILE: &str = "sedo_upload.csv";

/// One Sedo bulk-upload line: `domain,price,USD`.
pub fn sedo_row(domain: &str, price: f64) -> String {
    format!("{domain},{price:.2},USD")
}

pub struct MonetizationJob {
    ctx: Arc<AppContext>,
}

impl MonetizationJob {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    pub fn upload_path(&self) -> PathBuf {
        self.ctx.settings.data_dir.join(SEDO_UPLOAD_FILE)
    }

    /// List every valued `backordered` domain on Sedo at its mean valuation.
    /// The upload file is only written when something was listed.
    pub async fn execute(&self) -> Result<usize> {
        let backordered = self.ctx.store.domains_with_status(DomainStatus::Backordered).await?;
        let mut rows = Vec::new();
        for domain in &backordered {
            let valuations = self.ctx.store.valuations(domain.id).await?;
            let Some(price) = mean_valuation(&valuations) else {
                debug!(domain = %domain.name, "no valuation; not listed");
                continue;
            };
            rows.push(sedo_row(&domain.name, price));
            self.ctx
                .store
                .add_listing(domain.id, MARKETPLACE, None, "listed")
                .await?;
            self.ctx.store.set_status(domain.id, DomainStatus::Listed).await?;
        }

        if !rows.is_empty() {
            let path = self.upload_path();
            tokio::fs::create_dir_all(&self.ctx.settings.data_dir).await?;
            let mut body = rows.join("\n");
            body.push('\n');
            tokio::fs::write(&path, body).await?;
            info!(path = %path.display(), "wrote marketplace upload");
        }
        info!(count = rows.len(), marketplace = MARKETPLACE, "listed domains");
        report(&self.ctx, super::MONETIZATION, rows.len()).await;
        Ok(rows.len())
    }
}

#[async_trait]
impl Job for MonetizationJob {
    async fn run(&self) -> Result<()> {
        self.execute().await.map(|_| ())
    }
}
