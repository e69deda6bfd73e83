//! Domain generation: turn trend seeds into candidate domain names.

use super::report;
use crate::context::AppContext;
use crate::scheduler::Job;
use crate::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info};

static LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$").expect("label pattern compiles")
});

/// Lowercase, drop whitespace and anything outside `[a-z0-9-]`.
pub fn candidate_label(phrase: &str) -> String {
    phrase
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

/// Whether `label` is a valid DNS label (1-63 chars, no leading/trailing hyphen).
pub fn is_valid_label(label: &str) -> bool {
    LABEL.is_match(label)
}

/// One candidate per TLD, or none if the phrase yields no valid label.
pub fn generate_domains(phrase: &str, tlds: &[String]) -> Vec<String> {
    let label = candidate_label(phrase);
    if !is_valid_label(&label) {
        debug!(phrase, label = %label, "phrase does not produce a valid label");
        return Vec::new();
    }
    tlds.iter()
        .map(|t| t.trim().trim_start_matches('.').to_lowercase())
        .filter(|t| !t.is_empty())
        .map(|tld| format!("{label}.{tld}"))
        .collect()
}

pub struct DomainGeneratorJob {
    ctx: Arc<AppContext>,
}

impl DomainGeneratorJob {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Returns the number of new candidate domains.
    pub async fn execute(&self) -> Result<usize> {
        let seeds = self.ctx.store.trend_seeds().await?;
        let mut created = 0;
        for seed in &seeds {
            for name in generate_domains(&seed.phrase, &self.ctx.settings.tlds) {
                if self.ctx.store.insert_domain(&name, Some(seed.id)).await?.is_some() {
                    created += 1;
                }
            }
        }
        info!(seeds = seeds.len(), created, "generated domains");
        report(&self.ctx, super::DOMAIN_GENERATOR, created).await;
        Ok(created)
    }
}

#[async_trait]
impl Job for DomainGeneratorJob {
    async fn run(&self) -> Result<()> {
        self.execute().await.map(|_| ())
    }
}
