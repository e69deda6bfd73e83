//! Row types for pipeline state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type Id = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSeed {
    pub id: Id,
    pub phrase: String,
}

/// Where a domain is in the pipeline.
///
/// `new → available | taken`, then `available → valuated → monitoring →
/// backordered → listed`. `owned` is set outside the pipeline once a
/// backorder is won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainStatus {
    New,
    Available,
    Taken,
    Valuated,
    Monitoring,
    Backordered,
    Listed,
    Owned,
}

impl DomainStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainStatus::New => "new",
            DomainStatus::Available => "available",
            DomainStatus::Taken => "taken",
            DomainStatus::Valuated => "valuated",
            DomainStatus::Monitoring => "monitoring",
            DomainStatus::Backordered => "backordered",
            DomainStatus::Listed => "listed",
            DomainStatus::Owned => "owned",
        }
    }
}

impl fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub id: Id,
    pub name: String,
    pub trend_seed_id: Option<Id>,
    pub status: DomainStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityCheck {
    pub id: Id,
    pub domain_id: Id,
    pub checked_at: DateTime<Utc>,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    pub id: Id,
    pub domain_id: Id,
    pub service: String,
    pub value: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: Id,
    pub domain_id: Id,
    pub service: String,
    pub monitor_ref: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backorder {
    pub id: Id,
    pub domain_id: Id,
    pub provider: String,
    pub ordered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: Id,
    pub domain_id: Id,
    pub marketplace: String,
    pub url: Option<String>,
    /// `pending` until the marketplace accepts it, then `listed`.
    pub status: String,
}
