//! Interval and cron triggers.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc, Weekday};
use cron::Schedule;

use crate::{Error, ErrorContext, Result};

/// When a job fires.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Every `period`, first fire one period after registration.
    Interval(Duration),
    /// Wall-clock matches, evaluated in the scheduler's timezone.
    Cron(CronTrigger),
}

impl Trigger {
    pub fn interval(period: Duration) -> Result<Self> {
        if period.is_zero() {
            return Err(Error::validation_with_context(
                "interval trigger period must be non-zero",
                ErrorContext::new().with_source("trigger"),
            ));
        }
        Ok(Trigger::Interval(period))
    }

    pub fn every_minutes(minutes: u64) -> Result<Self> {
        Self::interval(Duration::from_secs(minutes.saturating_mul(60)))
    }

    pub fn cron(spec: CronSpec) -> Result<Self> {
        Ok(Trigger::Cron(CronTrigger::from_spec(&spec)?))
    }

    /// A standard 5-field (`min hour dom mon dow`) or 6-field cron expression.
    pub fn cron_expr(expr: &str) -> Result<Self> {
        Ok(Trigger::Cron(CronTrigger::parse(expr)?))
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Interval(period) => {
                let secs = period.as_secs();
                if secs > 0 && secs % 60 == 0 && period.subsec_nanos() == 0 {
                    write!(f, "every {}m", secs / 60)
                } else {
                    write!(f, "every {}ms", period.as_millis())
                }
            }
            Trigger::Cron(c) => write!(f, "cron '{}'", c.expression()),
        }
    }
}

/// Cron-style field set. Unset fields finer than the coarsest set field
/// default to their minimum; coarser unset fields match everything.
///
/// `CronSpec { hour: Some(0), ..Default::default() }` fires daily at 00:00,
/// `CronSpec { day_of_week: Some(Weekday::Sun), ..Default::default() }` fires
/// Sundays at 00:00.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CronSpec {
    pub minute: Option<u32>,
    pub hour: Option<u32>,
    pub day_of_week: Option<Weekday>,
}

impl CronSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn minute(mut self, minute: u32) -> Self {
        self.minute = Some(minute);
        self
    }

    pub fn hour(mut self, hour: u32) -> Self {
        self.hour = Some(hour);
        self
    }

    pub fn day_of_week(mut self, day: Weekday) -> Self {
        self.day_of_week = Some(day);
        self
    }

    /// Render as a 6-field expression (`sec min hour dom mon dow`).
    pub fn to_expression(&self) -> Result<String> {
        if let Some(m) = self.minute {
            if m > 59 {
                return Err(invalid_field("minute", m));
            }
        }
        if let Some(h) = self.hour {
            if h > 23 {
                return Err(invalid_field("hour", h));
            }
        }

        // coarsest to finest: day_of_week, hour, minute
        let set = [
            self.day_of_week.is_some(),
            self.hour.is_some(),
            self.minute.is_some(),
        ];
        let Some(coarsest) = set.iter().position(|s| *s) else {
            return Err(Error::validation_with_context(
                "cron trigger needs at least one of minute, hour, day_of_week",
                ErrorContext::new().with_source("trigger"),
            ));
        };

        let field = |idx: usize, value: Option<String>| match value {
            Some(v) => v,
            None if idx > coarsest => "0".to_string(),
            None => "*".to_string(),
        };
        let dow = field(0, self.day_of_week.map(|d| weekday_name(d).to_string()));
        let hour = field(1, self.hour.map(|h| h.to_string()));
        let minute = field(2, self.minute.map(|m| m.to_string()));

        Ok(format!("0 {minute} {hour} * * {dow}"))
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

fn invalid_field(name: &str, value: u32) -> Error {
    Error::validation_with_context(
        format!("cron {name} out of range: {value}"),
        ErrorContext::new()
            .with_field_path(name)
            .with_source("trigger"),
    )
}

/// Parsed cron schedule.
#[derive(Debug, Clone)]
pub struct CronTrigger {
    expression: String,
    schedule: Schedule,
}

impl CronTrigger {
    pub fn parse(expr: &str) -> Result<Self> {
        let expression = normalize_cron(expr);
        let schedule = Schedule::from_str(&expression).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid cron expression '{}'", expr.trim()),
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("trigger"),
            )
        })?;
        Ok(Self {
            expression,
            schedule,
        })
    }

    pub fn from_spec(spec: &CronSpec) -> Result<Self> {
        Self::parse(&spec.to_expression()?)
    }

    /// Normalized 6-field expression.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First matching instant strictly after `after`, evaluated in `tz`.
    pub fn next_after(&self, after: DateTime<Utc>, tz: FixedOffset) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&after.with_timezone(&tz))
            .next()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for seconds.
///
/// The `cron` crate requires `sec min hour day-of-month month day-of-week`.
pub(crate) fn normalize_cron(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}
