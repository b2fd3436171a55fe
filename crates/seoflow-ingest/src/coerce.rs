//! Field coercion rules, applied at one boundary.
//!
//! Money and counts are tolerant: a garbled value becomes zero and the row
//! keeps going, but every coercion is reported as a row warning. Natural-key
//! fields are strict: a missing or unparseable key rejects the row.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use seoflow_core::{AdMetricRecord, BookingRecord, RowIssue};
use uuid::Uuid;

use crate::raw::{RawAdSpend, RawBooking};

const UNKNOWN: &str = "unknown";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%Y/%m/%d"];

fn issue(row: usize, field: &str, message: impl Into<String>) -> RowIssue {
    RowIssue {
        row,
        field: field.to_string(),
        message: message.into(),
    }
}

/// Parse a currency amount such as `$1,234.50`, `1234.5`, or `(12.00)`.
pub(crate) fn parse_money(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    let (negative, inner) = match trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };
    let cleaned: String = inner
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' ' | '\u{a0}'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let value = Decimal::from_str(&cleaned).ok()?;
    Some(if negative { -value } else { value })
}

pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

fn money(value: Option<&str>, row: usize, field: &str, warnings: &mut Vec<RowIssue>) -> Decimal {
    let Some(raw) = value else {
        return Decimal::ZERO;
    };
    parse_money(raw).unwrap_or_else(|| {
        warnings.push(issue(
            row,
            field,
            format!("non-numeric amount '{raw}' coerced to 0"),
        ));
        Decimal::ZERO
    })
}

fn count(value: Option<&str>, row: usize, field: &str, warnings: &mut Vec<RowIssue>) -> i64 {
    let Some(raw) = value else {
        return 0;
    };
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    cleaned
        .trim()
        .parse::<i64>()
        .ok()
        .or_else(|| {
            Decimal::from_str(cleaned.trim())
                .ok()
                .and_then(|d| d.trunc().to_i64())
        })
        .unwrap_or_else(|| {
            warnings.push(issue(
                row,
                field,
                format!("non-numeric count '{raw}' coerced to 0"),
            ));
            0
        })
}

fn category(value: Option<String>) -> String {
    value.unwrap_or_else(|| UNKNOWN.to_string())
}

/// # Errors
///
/// Returns the row error when the trip id is missing.
pub(crate) fn booking_from_raw(
    raw: RawBooking,
    org: &str,
    import_run_id: Uuid,
    warnings: &mut Vec<RowIssue>,
) -> Result<BookingRecord, RowIssue> {
    let row = raw.row;
    let trip_id = raw
        .trip_id
        .ok_or_else(|| issue(row, "trip_id", "missing natural key"))?;

    let pickup_date = match raw.pickup_date.as_deref() {
        None => None,
        Some(value) => {
            let parsed = parse_date(value);
            if parsed.is_none() {
                warnings.push(issue(
                    row,
                    "pickup_date",
                    format!("unparseable date '{value}' ignored"),
                ));
            }
            parsed
        }
    };

    Ok(BookingRecord {
        trip_id,
        org: org.to_string(),
        total_amount: money(raw.total_amount.as_deref(), row, "total_amount", warnings),
        base_rate: money(raw.base_rate.as_deref(), row, "base_rate", warnings),
        tax_amount: money(raw.tax_amount.as_deref(), row, "tax_amount", warnings),
        driver_payout: money(raw.driver_payout.as_deref(), row, "driver_payout", warnings),
        service_type: category(raw.service_type),
        vehicle_type: category(raw.vehicle_type),
        booking_type: category(raw.booking_type),
        city: category(raw.city),
        pickup_date,
        import_run_id,
    })
}

/// # Errors
///
/// Returns the row error when the campaign id or date is missing or the date
/// cannot be parsed; both are part of the natural key.
pub(crate) fn ad_metric_from_raw(
    raw: RawAdSpend,
    org: &str,
    import_run_id: Uuid,
    warnings: &mut Vec<RowIssue>,
) -> Result<AdMetricRecord, RowIssue> {
    let row = raw.row;
    let campaign_id = raw
        .campaign_id
        .ok_or_else(|| issue(row, "campaign_id", "missing natural key"))?;
    let date_raw = raw
        .metric_date
        .ok_or_else(|| issue(row, "metric_date", "missing natural key"))?;
    let metric_date = parse_date(&date_raw)
        .ok_or_else(|| issue(row, "metric_date", format!("unparseable date '{date_raw}'")))?;

    let impressions = count(raw.impressions.as_deref(), row, "impressions", warnings);
    let clicks = count(raw.clicks.as_deref(), row, "clicks", warnings);
    let spend = money(raw.spend.as_deref(), row, "spend", warnings);
    let conversions = count(raw.conversions.as_deref(), row, "conversions", warnings);
    let revenue = money(raw.revenue.as_deref(), row, "revenue", warnings);

    Ok(AdMetricRecord {
        campaign_id,
        metric_date,
        org: org.to_string(),
        campaign_name: raw.campaign_name,
        impressions,
        clicks,
        spend,
        conversions,
        revenue,
        ctr: AdMetricRecord::compute_ctr(clicks, impressions),
        roi: AdMetricRecord::compute_roi(revenue, spend),
        import_run_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_accepts_currency_formatting() {
        assert_eq!(parse_money("$1,234.50"), Some(Decimal::new(123_450, 2)));
        assert_eq!(parse_money(" 80 "), Some(Decimal::new(80, 0)));
        assert_eq!(parse_money("(12.00)"), Some(Decimal::new(-1200, 2)));
        assert_eq!(parse_money("N/A"), None);
        assert_eq!(parse_money("$"), None);
    }

    #[test]
    fn dates_accept_common_export_formats() {
        let expected = NaiveDate::from_ymd_opt(2026, 3, 7);
        assert_eq!(parse_date("2026-03-07"), expected);
        assert_eq!(parse_date("03/07/2026"), expected);
        assert_eq!(parse_date("2026-03-07T18:30:00Z"), expected);
        assert_eq!(parse_date("next tuesday"), None);
    }

    #[test]
    fn garbled_money_is_zero_with_a_warning() {
        let raw = RawBooking {
            row: 4,
            trip_id: Some("T-4".to_string()),
            total_amount: Some("abc".to_string()),
            base_rate: Some("$80".to_string()),
            ..RawBooking::default()
        };
        let mut warnings = Vec::new();
        let record = booking_from_raw(raw, "acme", Uuid::nil(), &mut warnings).unwrap();
        assert_eq!(record.total_amount, Decimal::ZERO);
        assert_eq!(record.base_rate, Decimal::new(80, 0));
        assert_eq!(record.city, "unknown");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].row, 4);
        assert_eq!(warnings[0].field, "total_amount");
    }

    #[test]
    fn missing_trip_id_is_a_row_error() {
        let raw = RawBooking {
            row: 2,
            ..RawBooking::default()
        };
        let err = booking_from_raw(raw, "acme", Uuid::nil(), &mut Vec::new()).unwrap_err();
        assert_eq!(err.field, "trip_id");
    }

    #[test]
    fn bad_optional_pickup_date_is_a_warning_not_an_error() {
        let raw = RawBooking {
            row: 1,
            trip_id: Some("T-1".to_string()),
            pickup_date: Some("soon".to_string()),
            ..RawBooking::default()
        };
        let mut warnings = Vec::new();
        let record = booking_from_raw(raw, "acme", Uuid::nil(), &mut warnings).unwrap();
        assert!(record.pickup_date.is_none());
        assert_eq!(warnings[0].field, "pickup_date");
    }

    #[test]
    fn ad_row_derives_ctr_and_roi() {
        let raw = RawAdSpend {
            row: 1,
            campaign_id: Some("C1".to_string()),
            metric_date: Some("2026-03-01".to_string()),
            impressions: Some("1,000".to_string()),
            clicks: Some("50".to_string()),
            spend: Some("$100".to_string()),
            revenue: Some("300".to_string()),
            ..RawAdSpend::default()
        };
        let record = ad_metric_from_raw(raw, "acme", Uuid::nil(), &mut Vec::new()).unwrap();
        assert_eq!(record.impressions, 1000);
        assert!((record.ctr - 0.05).abs() < 1e-12);
        assert!((record.roi - 2.0).abs() < 1e-12);
    }

    #[test]
    fn ad_row_with_bad_date_is_rejected() {
        let raw = RawAdSpend {
            row: 3,
            campaign_id: Some("C1".to_string()),
            metric_date: Some("yesterday".to_string()),
            ..RawAdSpend::default()
        };
        let err = ad_metric_from_raw(raw, "acme", Uuid::nil(), &mut Vec::new()).unwrap_err();
        assert_eq!(err.field, "metric_date");
    }
}
