//! Trend discovery: pull trending phrases and store them as seeds.

use super::report;
use crate::context::AppContext;
use crate::scheduler::Job;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Source of trending search phrases.
#[async_trait]
pub trait TrendSource: Send + Sync {
    async fn fetch_trends(&self) -> Result<Vec<String>>;
}

/// Fixed phrase list.
#[derive(Debug, Clone)]
pub struct StaticTrendSource {
    phrases: Vec<String>,
}

impl StaticTrendSource {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            phrases: phrases.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for StaticTrendSource {
    fn default() -> Self {
        Self::new(["ai", "chatgpt", "quantum computing"])
    }
}

#[async_trait]
impl TrendSource for StaticTrendSource {
    async fn fetch_trends(&self) -> Result<Vec<String>> {
        Ok(self.phrases.clone())
    }
}

pub struct TrendDiscoveryJob {
    ctx: Arc<AppContext>,
    source: Arc<dyn TrendSource>,
}

impl TrendDiscoveryJob {
    pub fn new(ctx: Arc<AppContext>, source: Arc<dyn TrendSource>) -> Self {
        Self { ctx, source }
    }

    /// Returns the number of phrases that were new.
    pub async fn execute(&self) -> Result<usize> {
        let trends = self.source.fetch_trends().await?;
        let mut inserted = 0;
        for phrase in trends.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
            if self.ctx.store.insert_trend_seed(phrase).await?.is_some() {
                inserted += 1;
            }
        }
        info!(discovered = trends.len(), inserted, ?trends, "discovered trends");
        report(&self.ctx, super::TREND_DISCOVERY, inserted).await;
        Ok(inserted)
    }
}

#[async_trait]
impl Job for TrendDiscoveryJob {
    async fn run(&self) -> Result<()> {
        self.execute().await.map(|_| ())
    }
}
