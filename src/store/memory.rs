//! In-process [`Store`] implementation.

use super::models::*;
use super::Store;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Tables {
    next_id: Id,
    seeds: Vec<TrendSeed>,
    domains: Vec<Domain>,
    domain_by_name: HashMap<String, usize>,
    checks: Vec<AvailabilityCheck>,
    valuations: Vec<Valuation>,
    monitors: Vec<Monitor>,
    backorders: Vec<Backorder>,
    listings: Vec<Listing>,
}

impl Tables {
    fn next_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }

    fn require_domain(&self, id: Id) -> Result<usize> {
        self.domains
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| {
                Error::validation_with_context(
                    format!("unknown domain id {id}"),
                    ErrorContext::new().with_field_path("domain_id").with_source("store"),
                )
            })
    }

    fn lowest_valuation(&self, domain_id: Id) -> Option<f64> {
        self.valuations
            .iter()
            .filter(|v| v.domain_id == domain_id)
            .map(|v| v.value)
            .reduce(f64::min)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> Error {
    Error::runtime_with_context("store lock poisoned", ErrorContext::new().with_source("store"))
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_trend_seed(&self, phrase: &str) -> Result<Option<Id>> {
        let mut t = self.write()?;
        if t.seeds.iter().any(|s| s.phrase == phrase) {
            return Ok(None);
        }
        let id = t.next_id();
        t.seeds.push(TrendSeed {
            id,
            phrase: phrase.to_string(),
        });
        Ok(Some(id))
    }

    async fn trend_seeds(&self) -> Result<Vec<TrendSeed>> {
        Ok(self.read()?.seeds.clone())
    }

    async fn insert_domain(&self, name: &str, trend_seed_id: Option<Id>) -> Result<Option<Id>> {
        let mut t = self.write()?;
        if t.domain_by_name.contains_key(name) {
            return Ok(None);
        }
        let id = t.next_id();
        let idx = t.domains.len();
        t.domains.push(Domain {
            id,
            name: name.to_string(),
            trend_seed_id,
            status: DomainStatus::New,
            created_at: Utc::now(),
        });
        t.domain_by_name.insert(name.to_string(), idx);
        Ok(Some(id))
    }

    async fn domain(&self, id: Id) -> Result<Option<Domain>> {
        Ok(self.read()?.domains.iter().find(|d| d.id == id).cloned())
    }

    async fn domains(&self) -> Result<Vec<Domain>> {
        Ok(self.read()?.domains.clone())
    }

    async fn domains_with_status(&self, status: DomainStatus) -> Result<Vec<Domain>> {
        Ok(self
            .read()?
            .domains
            .iter()
            .filter(|d| d.status == status)
            .cloned()
            .collect())
    }

    async fn set_status(&self, id: Id, status: DomainStatus) -> Result<()> {
        let mut t = self.write()?;
        let idx = t.require_domain(id)?;
        t.domains[idx].status = status;
        Ok(())
    }

    async fn record_availability(&self, domain_id: Id, available: bool) -> Result<Id> {
        let mut t = self.write()?;
        t.require_domain(domain_id)?;
        let id = t.next_id();
        t.checks.push(AvailabilityCheck {
            id,
            domain_id,
            checked_at: Utc::now(),
            available,
        });
        Ok(id)
    }

    async fn availability_checks(&self, domain_id: Id) -> Result<Vec<AvailabilityCheck>> {
        Ok(self
            .read()?
            .checks
            .iter()
            .filter(|c| c.domain_id == domain_id)
            .cloned()
            .collect())
    }

    async fn add_valuation(&self, domain_id: Id, service: &str, value: f64) -> Result<Id> {
        let mut t = self.write()?;
        t.require_domain(domain_id)?;
        let id = t.next_id();
        t.valuations.push(Valuation {
            id,
            domain_id,
            service: service.to_string(),
            value,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn valuations(&self, domain_id: Id) -> Result<Vec<Valuation>> {
        Ok(self
            .read()?
            .valuations
            .iter()
            .filter(|v| v.domain_id == domain_id)
            .cloned()
            .collect())
    }

    async fn add_monitor(&self, domain_id: Id, service: &str, monitor_ref: &str) -> Result<Id> {
        let mut t = self.write()?;
        t.require_domain(domain_id)?;
        let id = t.next_id();
        t.monitors.push(Monitor {
            id,
            domain_id,
            service: service.to_string(),
            monitor_ref: monitor_ref.to_string(),
        });
        Ok(id)
    }

    async fn monitors(&self, service: &str) -> Result<Vec<Monitor>> {
        Ok(self
            .read()?
            .monitors
            .iter()
            .filter(|m| m.service == service)
            .cloned()
            .collect())
    }

    async fn drop_lowest_valued_monitor(&self, service: &str) -> Result<Option<Monitor>> {
        let mut t = self.write()?;
        let victim = t
            .monitors
            .iter()
            .enumerate()
            .filter(|(_, m)| m.service == service)
            .filter_map(|(i, m)| t.lowest_valuation(m.domain_id).map(|v| (i, v)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i);
        Ok(victim.map(|i| t.monitors.remove(i)))
    }

    async fn add_backorder(&self, domain_id: Id, provider: &str) -> Result<Id> {
        let mut t = self.write()?;
        t.require_domain(domain_id)?;
        let id = t.next_id();
        t.backorders.push(Backorder {
            id,
            domain_id,
            provider: provider.to_string(),
            ordered_at: Utc::now(),
        });
        Ok(id)
    }

    async fn backorders(&self) -> Result<Vec<Backorder>> {
        Ok(self.read()?.backorders.clone())
    }

    async fn add_listing(
        &self,
        domain_id: Id,
        marketplace: &str,
        url: Option<&str>,
        status: &str,
    ) -> Result<Id> {
        let mut t = self.write()?;
        t.require_domain(domain_id)?;
        let id = t.next_id();
        t.listings.push(Listing {
            id,
            domain_id,
            marketplace: marketplace.to_string(),
            url: url.map(str::to_string),
            status: status.to_string(),
        });
        Ok(id)
    }

    async fn listings(&self) -> Result<Vec<Listing>> {
        Ok(self.read()?.listings.clone())
    }
}
