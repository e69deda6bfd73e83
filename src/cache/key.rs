//! Cache key composition.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Colon-joined key, e.g. `valuation:EstiBot:example.com`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self(namespace.into())
    }

    /// Append one `:`-separated segment.
    pub fn part(mut self, segment: impl fmt::Display) -> Self {
        self.0.push(':');
        self.0.push_str(&segment.to_string());
        self
    }

    pub fn valuation(service: &str, domain: &str) -> Self {
        Self::new("valuation").part(service).part(domain)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
