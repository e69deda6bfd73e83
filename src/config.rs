//! Runtime settings.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! `DOMAIN_PIPELINE_*` environment variables.

use crate::{Error, ErrorContext, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "DOMAIN_PIPELINE_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceSettings {
    /// Token refill rate for external calls (tokens per second).
    pub rate_per_sec: f64,
    /// Token bucket capacity.
    pub burst: u32,
    /// Consecutive failures that open a breaker.
    pub max_failures: u32,
    pub reset_timeout_secs: u64,
    pub retries: u32,
    /// Base delay; attempt `n` waits `n × backoff_ms`.
    pub backoff_ms: u64,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            rate_per_sec: 5.0,
            burst: 5,
            max_failures: 5,
            reset_timeout_secs: 60,
            retries: 3,
            backoff_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub debug: bool,
    /// Directory for exported CSV files.
    pub data_dir: PathBuf,
    /// JSON file backing the valuation cache.
    pub cache_path: PathBuf,
    /// `UTC` or a fixed offset such as `+02:00`; cron triggers fire in this zone.
    pub scheduler_timezone: String,
    /// TLDs appended to generated candidate names.
    pub tlds: Vec<String>,
    pub resilience: ResilienceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            data_dir: PathBuf::from("./data"),
            cache_path: PathBuf::from("./data/valuation_cache.json"),
            scheduler_timezone: "UTC".to_string(),
            tlds: vec!["com".to_string()],
            resilience: ResilienceSettings::default(),
        }
    }
}

impl Settings {
    /// Defaults overlaid with environment variables.
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load a YAML file, then overlay environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Overlay values from `lookup(DOMAIN_PIPELINE_<NAME>)`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = var("DEBUG") {
            self.debug = matches!(v.trim(), "1" | "true" | "TRUE" | "yes");
        }
        if let Some(v) = var("DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = var("CACHE_PATH") {
            self.cache_path = PathBuf::from(v);
        }
        if let Some(v) = var("SCHEDULER_TIMEZONE") {
            self.scheduler_timezone = v;
        }
        if let Some(v) = var("TLDS") {
            self.tlds = v
                .split(',')
                .map(|t| t.trim().trim_start_matches('.').to_lowercase())
                .filter(|t| !t.is_empty())
                .collect();
        }

        let r = &mut self.resilience;
        if let Some(v) = var("RPS") {
            r.rate_per_sec = parse_env("RPS", &v)?;
        }
        if let Some(v) = var("BURST") {
            r.burst = parse_env("BURST", &v)?;
        }
        if let Some(v) = var("BREAKER_FAILURE_THRESHOLD") {
            r.max_failures = parse_env("BREAKER_FAILURE_THRESHOLD", &v)?;
        }
        if let Some(v) = var("BREAKER_RESET_SECS") {
            r.reset_timeout_secs = parse_env("BREAKER_RESET_SECS", &v)?;
        }
        if let Some(v) = var("RETRIES") {
            r.retries = parse_env("RETRIES", &v)?;
        }
        if let Some(v) = var("BACKOFF_MS") {
            r.backoff_ms = parse_env("BACKOFF_MS", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let r = &self.resilience;
        if !r.rate_per_sec.is_finite() || r.rate_per_sec < 0.0 {
            return Err(invalid("resilience.rate_per_sec", "must be a finite, non-negative number"));
        }
        if r.burst == 0 {
            return Err(invalid("resilience.burst", "must be at least 1"));
        }
        if r.max_failures == 0 {
            return Err(invalid("resilience.max_failures", "must be at least 1"));
        }
        if self.tlds.is_empty() {
            return Err(invalid("tlds", "at least one TLD is required"));
        }
        self.timezone()?;
        Ok(())
    }

    /// The scheduler timezone as a fixed UTC offset.
    pub fn timezone(&self) -> Result<FixedOffset> {
        parse_timezone(&self.scheduler_timezone)
    }
}

/// Parse `UTC`, `Z`, `+HH:MM`, `-HH:MM` or `+HHMM` into an offset.
pub fn parse_timezone(raw: &str) -> Result<FixedOffset> {
    let s = raw.trim();
    if s.eq_ignore_ascii_case("utc") || s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("gmt") {
        return FixedOffset::east_opt(0).ok_or_else(|| invalid("scheduler_timezone", raw));
    }

    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(invalid("scheduler_timezone", format!("unsupported timezone '{raw}'"))),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("scheduler_timezone", format!("unsupported timezone '{raw}'")));
    }
    let hours: i32 = digits[..2].parse().unwrap_or(0);
    let minutes: i32 = digits[2..].parse().unwrap_or(0);
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| invalid("scheduler_timezone", format!("offset out of range '{raw}'")))
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| {
        Error::configuration_with_context(
            format!("cannot parse '{value}'"),
            ErrorContext::new()
                .with_field_path(format!("{ENV_PREFIX}{name}"))
                .with_source("settings"),
        )
    })
}

fn invalid(field: &str, details: impl Into<String>) -> Error {
    Error::configuration_with_context(
        "invalid setting",
        ErrorContext::new()
            .with_field_path(field)
            .with_details(details)
            .with_source("settings"),
    )
}
