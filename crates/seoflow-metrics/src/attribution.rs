//! Ad-spend attribution strategies.
//!
//! The engine never assumes a fixed attribution; it asks an
//! [`AdSpendAttribution`] and bounds the call with a timeout.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use seoflow_core::{AdMetricRecord, AttributionStrategy, BookingRecord};

use crate::MetricsError;

/// Ad spend assigned to bookings, keyed by trip id. Absent trips get zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributed(HashMap<String, Decimal>);

impl Attributed {
    #[must_use]
    pub fn spend_for(&self, trip_id: &str) -> Decimal {
        self.0.get(trip_id).copied().unwrap_or(Decimal::ZERO)
    }

    #[must_use]
    pub fn total(&self) -> Decimal {
        self.0.values().copied().sum()
    }

    pub fn insert(&mut self, trip_id: impl Into<String>, spend: Decimal) {
        *self.0.entry(trip_id.into()).or_insert(Decimal::ZERO) += spend;
    }
}

#[async_trait]
pub trait AdSpendAttribution: Send + Sync {
    /// Strategy name for logs.
    fn name(&self) -> &'static str;

    async fn attribute(
        &self,
        bookings: &[BookingRecord],
        ads: &[AdMetricRecord],
    ) -> Result<Attributed, MetricsError>;
}

/// The strategy a pipeline config selects.
#[must_use]
pub fn attribution_for(strategy: AttributionStrategy) -> Arc<dyn AdSpendAttribution> {
    match strategy {
        AttributionStrategy::None => Arc::new(NoAttribution),
        AttributionStrategy::RevenueShare => Arc::new(RevenueShareAttribution),
    }
}

/// Attributes nothing. Profit is then revenue less tax and payout.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAttribution;

#[async_trait]
impl AdSpendAttribution for NoAttribution {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn attribute(
        &self,
        _bookings: &[BookingRecord],
        _ads: &[AdMetricRecord],
    ) -> Result<Attributed, MetricsError> {
        Ok(Attributed::default())
    }
}

/// Spreads each day's ad spend over that day's bookings in proportion to
/// booking revenue, or evenly when the day had no revenue. Spend on days
/// without bookings stays unattributed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RevenueShareAttribution;

#[async_trait]
impl AdSpendAttribution for RevenueShareAttribution {
    fn name(&self) -> &'static str {
        "revenue_share"
    }

    async fn attribute(
        &self,
        bookings: &[BookingRecord],
        ads: &[AdMetricRecord],
    ) -> Result<Attributed, MetricsError> {
        let mut spend_by_day: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for ad in ads {
            *spend_by_day.entry(ad.metric_date).or_insert(Decimal::ZERO) += ad.spend;
        }

        let mut bookings_by_day: BTreeMap<NaiveDate, Vec<&BookingRecord>> = BTreeMap::new();
        for booking in bookings {
            if let Some(day) = booking.pickup_date {
                bookings_by_day.entry(day).or_default().push(booking);
            }
        }

        let mut attributed = Attributed::default();
        for (day, spend) in spend_by_day {
            let Some(day_bookings) = bookings_by_day.get(&day) else {
                continue;
            };
            split_day(spend, day_bookings, &mut attributed);
        }
        Ok(attributed)
    }
}

/// The last booking absorbs rounding so the day's shares sum to `spend`.
fn split_day(spend: Decimal, bookings: &[&BookingRecord], out: &mut Attributed) {
    let revenue: Decimal = bookings.iter().map(|b| b.total_amount).sum();
    let count = Decimal::from(bookings.len());
    let mut assigned = Decimal::ZERO;
    for (i, booking) in bookings.iter().enumerate() {
        let share = if i + 1 == bookings.len() {
            spend - assigned
        } else if revenue.is_zero() {
            (spend / count).round_dp(2)
        } else {
            (spend * booking.total_amount / revenue).round_dp(2)
        };
        assigned += share;
        out.insert(booking.trip_id.clone(), share);
    }
}
