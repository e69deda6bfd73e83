//! Domain valuation against external appraisal services.

use super::report;
use crate::cache::CacheKey;
use crate::context::AppContext;
use crate::resilience::Guarded;
use crate::scheduler::Job;
use crate::store::DomainStatus;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// An appraisal service returning an estimated price in USD.
#[async_trait]
pub trait ValuationService: Send + Sync {
    /// Name used in stored valuations and cache keys.
    fn name(&self) -> &str;

    async fn value(&self, domain: &str) -> Result<f64>;
}

#[async_trait]
impl<S: ValuationService> ValuationService for Guarded<S> {
    fn name(&self) -> &str {
        self.inner().name()
    }

    async fn value(&self, domain: &str) -> Result<f64> {
        self.call(|service| service.value(domain)).await
    }
}

/// Returns the same value for every domain.
#[derive(Debug, Clone)]
pub struct StaticValuation {
    name: String,
    value: f64,
}

impl StaticValuation {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// EstiBot 100, HumbleWorth 80, GoDaddy 60.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("EstiBot", 100.0),
            Self::new("HumbleWorth", 80.0),
            Self::new("GoDaddy", 60.0),
        ]
    }
}

#[async_trait]
impl ValuationService for StaticValuation {
    fn name(&self) -> &str {
        &self.name
    }

    async fn value(&self, _domain: &str) -> Result<f64> {
        Ok(self.value)
    }
}

#[derive(Deserialize)]
struct ValueResponse {
    value: f64,
}

/// `GET {endpoint}?domain=<name>` returning `{"value": <number>}`.
pub struct HttpValuationService {
    name: String,
    endpoint: Url,
    client: reqwest::Client,
}

impl HttpValuationService {
    pub fn new(name: impl Into<String>, endpoint: &str) -> Result<Self> {
        Self::with_timeout(name, endpoint, Duration::from_secs(10))
    }

    pub fn with_timeout(name: impl Into<String>, endpoint: &str, timeout: Duration) -> Result<Self> {
        let name = name.into();
        let endpoint = Url::parse(endpoint).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid endpoint for valuation service '{name}'"),
                ErrorContext::new()
                    .with_field_path("endpoint")
                    .with_details(e.to_string())
                    .with_source("valuation"),
            )
        })?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            name,
            endpoint,
            client,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ValuationService for HttpValuationService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn value(&self, domain: &str) -> Result<f64> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("domain", domain);

        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            let mut message: String = body.chars().take(200).collect();
            if message.is_empty() {
                message = status.canonical_reason().unwrap_or("request failed").to_string();
            }
            return Err(Error::Remote {
                status: status.as_u16(),
                message,
                retryable: status.as_u16() == 429 || status.is_server_error(),
            });
        }
        let parsed: ValueResponse = serde_json::from_str(&body)?;
        Ok(parsed.value)
    }
}

pub struct ValuationJob {
    ctx: Arc<AppContext>,
    services: Vec<Arc<dyn ValuationService>>,
}

impl ValuationJob {
    pub fn new(ctx: Arc<AppContext>, services: Vec<Arc<dyn ValuationService>>) -> Self {
        Self { ctx, services }
    }

    /// Value every `available` domain with every service. Returns how many
    /// domains reached `valuated`.
    ///
    /// Results are memoized per service and domain. A domain is only recorded
    /// once all services answered; otherwise it stays `available` and the
    /// cached answers are reused next run.
    pub async fn execute(&self) -> Result<usize> {
        let pending = self.ctx.store.domains_with_status(DomainStatus::Available).await?;
        let mut valuated = 0;
        'domains: for domain in &pending {
            let mut values = Vec::with_capacity(self.services.len());
            for service in &self.services {
                let key = CacheKey::valuation(service.name(), &domain.name);
                match self
                    .ctx
                    .cache
                    .get_or_compute(&key, || service.value(&domain.name))
                    .await
                {
                    Ok(value) => values.push((service.name(), value)),
                    Err(e) => {
                        warn!(
                            domain = %domain.name,
                            service = service.name(),
                            error = %e,
                            "valuation failed"
                        );
                        continue 'domains;
                    }
                }
            }
            for (service, value) in values {
                self.ctx.store.add_valuation(domain.id, service, value).await?;
            }
            self.ctx.store.set_status(domain.id, DomainStatus::Valuated).await?;
            valuated += 1;
        }
        info!(pending = pending.len(), valuated, "valuated domains");
        report(&self.ctx, super::VALUATION, valuated).await;
        Ok(valuated)
    }
}

#[async_trait]
impl Job for ValuationJob {
    async fn run(&self) -> Result<()> {
        self.execute().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_endpoint() {
        let err = HttpValuationService::new("EstiBot", "not a url").err().unwrap();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_static_defaults() {
        let names: Vec<(String, f64)> = {
            let mut out = Vec::new();
            for s in StaticValuation::defaults() {
                out.push((s.name().to_string(), s.value("x.com").await.unwrap()));
            }
            out
        };
        assert_eq!(
            names,
            vec![
                ("EstiBot".to_string(), 100.0),
                ("HumbleWorth".to_string(), 80.0),
                ("GoDaddy".to_string(), 60.0)
            ]
        );
    }
}
