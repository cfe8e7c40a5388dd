//! Time-range table: analysis window, cache TTL and staleness threshold.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ParseLabelError;

/// Requested analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "28d")]
    FourWeeks,
    #[serde(rename = "1y")]
    Year,
    #[serde(rename = "5y")]
    FiveYears,
}

impl TimeRange {
    pub const ALL: [Self; 5] = [
        Self::Day,
        Self::Week,
        Self::FourWeeks,
        Self::Year,
        Self::FiveYears,
    ];

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Day => "24h",
            Self::Week => "7d",
            Self::FourWeeks => "28d",
            Self::Year => "1y",
            Self::FiveYears => "5y",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ParseLabelError> {
        Self::ALL
            .into_iter()
            .find(|r| r.label().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| ParseLabelError {
                kind: "time range",
                value: value.to_string(),
            })
    }

    /// Length of the analysis window.
    #[must_use]
    pub fn window(&self) -> Duration {
        match self {
            Self::Day => Duration::hours(24),
            Self::Week => Duration::days(7),
            Self::FourWeeks => Duration::days(28),
            Self::Year => Duration::days(365),
            Self::FiveYears => Duration::days(5 * 365),
        }
    }

    /// How long a cache entry for this range is valid.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        match self {
            Self::Day => Duration::minutes(30),
            Self::Week => Duration::minutes(60),
            Self::FourWeeks => Duration::minutes(120),
            Self::Year => Duration::minutes(240),
            Self::FiveYears => Duration::minutes(480),
        }
    }

    /// Age after which a cache entry is flagged stale (but still served).
    #[must_use]
    pub fn staleness_threshold(&self) -> Duration {
        match self {
            Self::Day => Duration::minutes(15),
            Self::Week => Duration::minutes(30),
            Self::FourWeeks => Duration::minutes(60),
            Self::Year => Duration::minutes(120),
            Self::FiveYears => Duration::minutes(240),
        }
    }

    /// Earliest comment timestamp retained for a request made at `now`.
    #[must_use]
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window()
    }

    #[must_use]
    pub fn is_stale(&self, refreshed_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - refreshed_at > self.staleness_threshold()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
