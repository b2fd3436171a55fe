//! Raw feed rows as a tagged union with one named accessor per field.
//!
//! Cells are trimmed and empty cells become `None`. Nothing here coerces
//! values; that happens once, in `coerce`.

use std::collections::HashMap;

use seoflow_core::FeedType;

use crate::IngestError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBooking {
    /// 1-based data row number.
    pub row: usize,
    pub trip_id: Option<String>,
    pub total_amount: Option<String>,
    pub base_rate: Option<String>,
    pub tax_amount: Option<String>,
    pub driver_payout: Option<String>,
    pub service_type: Option<String>,
    pub vehicle_type: Option<String>,
    pub booking_type: Option<String>,
    pub city: Option<String>,
    pub pickup_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAdSpend {
    pub row: usize,
    pub campaign_id: Option<String>,
    pub metric_date: Option<String>,
    pub campaign_name: Option<String>,
    pub impressions: Option<String>,
    pub clicks: Option<String>,
    pub spend: Option<String>,
    pub conversions: Option<String>,
    pub revenue: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRecord {
    Booking(RawBooking),
    AdSpend(RawAdSpend),
}

impl RawRecord {
    #[must_use]
    pub fn row(&self) -> usize {
        match self {
            RawRecord::Booking(b) => b.row,
            RawRecord::AdSpend(a) => a.row,
        }
    }
}

/// Lowercase, trim, and fold spaces/dashes to underscores.
fn normalize_header(cell: &str) -> String {
    cell.trim()
        .trim_start_matches('\u{feff}')
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

const BOOKING_COLUMNS: &[(&str, &[&str])] = &[
    ("trip_id", &["trip_id", "tripid", "trip", "booking_id", "reservation_id"]),
    ("total_amount", &["total_amount", "total", "amount", "grand_total"]),
    ("base_rate", &["base_rate", "base", "base_fare"]),
    ("tax_amount", &["tax_amount", "tax", "taxes"]),
    ("driver_payout", &["driver_payout", "payout", "driver_pay"]),
    ("service_type", &["service_type", "service"]),
    ("vehicle_type", &["vehicle_type", "vehicle"]),
    ("booking_type", &["booking_type", "trip_type"]),
    ("city", &["city", "pickup_city"]),
    ("pickup_date", &["pickup_date", "date", "trip_date"]),
];

const AD_COLUMNS: &[(&str, &[&str])] = &[
    ("campaign_id", &["campaign_id", "campaignid"]),
    ("metric_date", &["metric_date", "date", "day"]),
    ("campaign_name", &["campaign_name", "campaign"]),
    ("impressions", &["impressions", "impr"]),
    ("clicks", &["clicks"]),
    ("spend", &["spend", "cost", "amount_spent"]),
    ("conversions", &["conversions", "conv"]),
    ("revenue", &["revenue", "conversion_value", "conv_value"]),
];

struct ColumnIndex(HashMap<&'static str, usize>);

impl ColumnIndex {
    fn build(header: &[String], spec: &[(&'static str, &[&str])]) -> Self {
        let normalized: Vec<String> = header.iter().map(|h| normalize_header(h)).collect();
        let mut index = HashMap::new();
        for (canonical, aliases) in spec {
            if let Some(pos) = normalized
                .iter()
                .position(|h| aliases.contains(&h.as_str()))
            {
                index.insert(*canonical, pos);
            }
        }
        Self(index)
    }

    fn require(&self, feed_type: FeedType, column: &'static str) -> Result<(), IngestError> {
        if self.0.contains_key(column) {
            Ok(())
        } else {
            Err(IngestError::MissingColumn { feed_type, column })
        }
    }

    fn get(&self, cells: &[String], column: &str) -> Option<String> {
        let pos = *self.0.get(column)?;
        cells
            .get(pos)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    }
}

/// Split `raw_rows` (header first) into typed raw records.
///
/// Rows where every cell is blank are dropped. Row numbers count every
/// data row of the source, blank ones included, so row 1 is the line after
/// the header.
///
/// # Errors
///
/// [`IngestError::EmptyFeed`] without a header, [`IngestError::MissingColumn`]
/// when the header lacks a natural-key column.
pub fn parse_feed(feed_type: FeedType, raw_rows: &[Vec<String>]) -> Result<Vec<RawRecord>, IngestError> {
    let (header, body) = raw_rows.split_first().ok_or(IngestError::EmptyFeed)?;

    let spec = match feed_type {
        FeedType::Booking => BOOKING_COLUMNS,
        FeedType::AdSpend => AD_COLUMNS,
    };
    let index = ColumnIndex::build(header, spec);
    match feed_type {
        FeedType::Booking => index.require(feed_type, "trip_id")?,
        FeedType::AdSpend => {
            index.require(feed_type, "campaign_id")?;
            index.require(feed_type, "metric_date")?;
        }
    }

    let records = body
        .iter()
        .enumerate()
        .filter(|(_, cells)| cells.iter().any(|c| !c.trim().is_empty()))
        .map(|(i, cells)| {
            let row = i + 1;
            match feed_type {
                FeedType::Booking => RawRecord::Booking(RawBooking {
                    row,
                    trip_id: index.get(cells, "trip_id"),
                    total_amount: index.get(cells, "total_amount"),
                    base_rate: index.get(cells, "base_rate"),
                    tax_amount: index.get(cells, "tax_amount"),
                    driver_payout: index.get(cells, "driver_payout"),
                    service_type: index.get(cells, "service_type"),
                    vehicle_type: index.get(cells, "vehicle_type"),
                    booking_type: index.get(cells, "booking_type"),
                    city: index.get(cells, "city"),
                    pickup_date: index.get(cells, "pickup_date"),
                }),
                FeedType::AdSpend => RawRecord::AdSpend(RawAdSpend {
                    row,
                    campaign_id: index.get(cells, "campaign_id"),
                    metric_date: index.get(cells, "metric_date"),
                    campaign_name: index.get(cells, "campaign_name"),
                    impressions: index.get(cells, "impressions"),
                    clicks: index.get(cells, "clicks"),
                    spend: index.get(cells, "spend"),
                    conversions: index.get(cells, "conversions"),
                    revenue: index.get(cells, "revenue"),
                }),
            }
        })
        .collect();

    Ok(records)
}
