use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedClass {
    Daily,
    Weekly,
}

impl FeedClass {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FeedClass::Daily => "daily",
            FeedClass::Weekly => "weekly",
        }
    }

    /// Age at which a source stops being fresh.
    #[must_use]
    pub fn threshold_hours(self) -> f64 {
        match self {
            FeedClass::Daily => 24.0,
            FeedClass::Weekly => 168.0,
        }
    }

    /// Hard ceiling past which publishing freezes regardless of classification.
    #[must_use]
    pub fn freeze_after_hours(self) -> f64 {
        match self {
            FeedClass::Daily => 72.0,
            FeedClass::Weekly => 14.0 * 24.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessState {
    Fresh,
    Stale,
    Critical,
    Missing,
}

impl FreshnessState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FreshnessState::Fresh => "fresh",
            FreshnessState::Stale => "stale",
            FreshnessState::Critical => "critical",
            FreshnessState::Missing => "missing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreshnessStatus {
    pub source: String,
    pub class: FeedClass,
    pub last_updated: Option<DateTime<Utc>>,
    pub age_hours: Option<f64>,
    pub status: FreshnessState,
    pub checked_at: DateTime<Utc>,
}
