//! Persistent pipeline state.
//!
//! Jobs talk to storage only through the [`Store`] trait. Each call is applied
//! atomically, so there is no separate commit step. [`MemoryStore`] keeps
//! everything in process; a SQL-backed implementation can slot in behind the
//! same trait.

mod memory;
mod models;

pub use memory::MemoryStore;
pub use models::{
    AvailabilityCheck, Backorder, Domain, DomainStatus, Id, Listing, Monitor, TrendSeed, Valuation,
};

use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a trend phrase. Returns `None` if the phrase already exists.
    async fn insert_trend_seed(&self, phrase: &str) -> Result<Option<Id>>;
    async fn trend_seeds(&self) -> Result<Vec<TrendSeed>>;

    /// Insert a candidate domain with status `new`. Returns `None` if the name already exists.
    async fn insert_domain(&self, name: &str, trend_seed_id: Option<Id>) -> Result<Option<Id>>;
    async fn domain(&self, id: Id) -> Result<Option<Domain>>;
    async fn domains(&self) -> Result<Vec<Domain>>;
    async fn domains_with_status(&self, status: DomainStatus) -> Result<Vec<Domain>>;
    async fn set_status(&self, id: Id, status: DomainStatus) -> Result<()>;

    async fn record_availability(&self, domain_id: Id, available: bool) -> Result<Id>;
    async fn availability_checks(&self, domain_id: Id) -> Result<Vec<AvailabilityCheck>>;

    async fn add_valuation(&self, domain_id: Id, service: &str, value: f64) -> Result<Id>;
    async fn valuations(&self, domain_id: Id) -> Result<Vec<Valuation>>;

    async fn add_monitor(&self, domain_id: Id, service: &str, monitor_ref: &str) -> Result<Id>;
    async fn monitors(&self, service: &str) -> Result<Vec<Monitor>>;
    /// Delete the monitor on `service` whose domain has the lowest valuation.
    /// Monitors on unvalued domains are never chosen.
    async fn drop_lowest_valued_monitor(&self, service: &str) -> Result<Option<Monitor>>;

    async fn add_backorder(&self, domain_id: Id, provider: &str) -> Result<Id>;
    async fn backorders(&self) -> Result<Vec<Backorder>>;

    async fn add_listing(
        &self,
        domain_id: Id,
        marketplace: &str,
        url: Option<&str>,
        status: &str,
    ) -> Result<Id>;
    async fn listings(&self) -> Result<Vec<Listing>>;
}
