//! Import runs and the records they own.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedType {
    Booking,
    AdSpend,
}

impl FeedType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FeedType::Booking => "booking",
            FeedType::AdSpend => "ad_spend",
        }
    }
}

impl std::fmt::Display for FeedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FeedType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "booking" => Ok(FeedType::Booking),
            "ad_spend" | "ad-spend" => Ok(FeedType::AdSpend),
            _ => Err(CoreError::UnknownVariant {
                kind: "feed type",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Processing,
    Completed,
    CompletedWithErrors,
    RolledBack,
}

impl ImportStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ImportStatus::Processing => "processing",
            ImportStatus::Completed => "completed",
            ImportStatus::CompletedWithErrors => "completed_with_errors",
            ImportStatus::RolledBack => "rolled_back",
        }
    }

    /// Terminal statuses whose records downstream readers may treat as final.
    #[must_use]
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            ImportStatus::Completed | ImportStatus::CompletedWithErrors
        )
    }
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ImportStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(ImportStatus::Processing),
            "completed" => Ok(ImportStatus::Completed),
            "completed_with_errors" => Ok(ImportStatus::CompletedWithErrors),
            "rolled_back" => Ok(ImportStatus::RolledBack),
            _ => Err(CoreError::UnknownVariant {
                kind: "import status",
                value: s.to_string(),
            }),
        }
    }
}

/// One row-level problem captured during ingestion. `row` is 1-based over
/// data rows (the header is not counted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowIssue {
    pub row: usize,
    pub field: String,
    pub message: String,
}

/// Audit record of a single ingestion attempt and the rollback key for
/// every record it wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRun {
    pub id: Uuid,
    pub org: String,
    pub feed_type: FeedType,
    pub source_label: String,
    pub status: ImportStatus,
    pub total_rows: i64,
    pub imported_count: i64,
    /// Rows that replaced an existing record (ad merges, explicit booking overwrites).
    pub updated_count: i64,
    pub skipped_count: i64,
    pub error_count: i64,
    pub warning_count: i64,
    pub error_samples: Vec<RowIssue>,
    pub warning_samples: Vec<RowIssue>,
    pub created_by: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub rolled_back_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub trip_id: String,
    pub org: String,
    pub total_amount: Decimal,
    pub base_rate: Decimal,
    pub tax_amount: Decimal,
    pub driver_payout: Decimal,
    pub service_type: String,
    pub vehicle_type: String,
    pub booking_type: String,
    pub city: String,
    pub pickup_date: Option<NaiveDate>,
    pub import_run_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdMetricRecord {
    pub campaign_id: String,
    pub metric_date: NaiveDate,
    pub org: String,
    pub campaign_name: Option<String>,
    pub impressions: i64,
    pub clicks: i64,
    pub spend: Decimal,
    pub conversions: i64,
    pub revenue: Decimal,
    pub ctr: f64,
    pub roi: f64,
    pub import_run_id: Uuid,
}

impl AdMetricRecord {
    /// Click-through rate; zero when there were no impressions.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compute_ctr(clicks: i64, impressions: i64) -> f64 {
        if impressions <= 0 {
            0.0
        } else {
            clicks as f64 / impressions as f64
        }
    }

    /// Return on ad spend as `(revenue - spend) / spend`; zero when nothing was spent.
    #[must_use]
    pub fn compute_roi(revenue: Decimal, spend: Decimal) -> f64 {
        use rust_decimal::prelude::ToPrimitive;

        if spend.is_zero() {
            return 0.0;
        }
        ((revenue - spend) / spend).to_f64().unwrap_or(0.0)
    }
}
