//! Derived metrics shapes. Everything here is recomputable from records.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentType {
    ServiceType,
    City,
    VehicleType,
    BookingType,
}

impl SegmentType {
    pub const ALL: [SegmentType; 4] = [
        SegmentType::ServiceType,
        SegmentType::City,
        SegmentType::VehicleType,
        SegmentType::BookingType,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SegmentType::ServiceType => "service_type",
            SegmentType::City => "city",
            SegmentType::VehicleType => "vehicle_type",
            SegmentType::BookingType => "booking_type",
        }
    }
}

impl std::fmt::Display for SegmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SegmentType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "service_type" | "service" => Ok(SegmentType::ServiceType),
            "city" => Ok(SegmentType::City),
            "vehicle_type" | "vehicle" => Ok(SegmentType::VehicleType),
            "booking_type" | "booking" => Ok(SegmentType::BookingType),
            _ => Err(CoreError::UnknownVariant {
                kind: "segment type",
                value: s.to_string(),
            }),
        }
    }
}

/// Aggregate money figures shared by daily rollups and segment breakdowns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProfitFigures {
    pub revenue: Decimal,
    pub tax: Decimal,
    pub driver_payout: Decimal,
    pub ad_spend: Decimal,
    pub profit: Decimal,
    /// `profit / revenue`, zero when there was no revenue.
    pub margin: f64,
    pub average_order_value: Decimal,
    pub booking_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RollupKey {
    Daily {
        date: NaiveDate,
    },
    Segment {
        segment_type: SegmentType,
        segment_value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRollup {
    pub org: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub key: RollupKey,
    pub figures: ProfitFigures,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentMetrics {
    pub segment_type: SegmentType,
    pub segment_value: String,
    pub figures: ProfitFigures,
}
