//! The profit proxy and the accumulator shared by every aggregate.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use seoflow_core::{BookingRecord, MarginTable, ProfitFigures};

use crate::attribution::Attributed;

/// Money figures for one booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BookingProfit {
    pub revenue: Decimal,
    pub tax: Decimal,
    pub driver_payout: Decimal,
    pub ad_spend: Decimal,
    pub profit: Decimal,
}

/// `profit = revenue - revenue*tax_rate - base_rate*payout_rate - ad_spend`,
/// with rates looked up by the booking's service type.
#[must_use]
pub fn booking_profit(
    booking: &BookingRecord,
    margins: &MarginTable,
    attributed_ad_spend: Decimal,
) -> BookingProfit {
    let rates = margins.rates_for(&booking.service_type);
    let revenue = booking.total_amount;
    let tax = revenue * rates.tax_rate;
    let driver_payout = booking.base_rate * rates.payout_rate;
    BookingProfit {
        revenue,
        tax,
        driver_payout,
        ad_spend: attributed_ad_spend,
        profit: revenue - tax - driver_payout - attributed_ad_spend,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PricedBooking<'a> {
    pub record: &'a BookingRecord,
    pub profit: BookingProfit,
}

#[must_use]
pub fn price_bookings<'a>(
    bookings: &'a [BookingRecord],
    margins: &MarginTable,
    attributed: &Attributed,
) -> Vec<PricedBooking<'a>> {
    bookings
        .iter()
        .map(|record| PricedBooking {
            record,
            profit: booking_profit(record, margins, attributed.spend_for(&record.trip_id)),
        })
        .collect()
}

/// Sums booking profits into [`ProfitFigures`].
#[derive(Debug, Clone, Default)]
pub struct FiguresBuilder {
    totals: BookingProfit,
    count: i64,
}

impl FiguresBuilder {
    pub fn add(&mut self, profit: &BookingProfit) {
        self.totals.revenue += profit.revenue;
        self.totals.tax += profit.tax;
        self.totals.driver_payout += profit.driver_payout;
        self.totals.ad_spend += profit.ad_spend;
        self.totals.profit += profit.profit;
        self.count += 1;
    }

    #[must_use]
    pub fn build(self) -> ProfitFigures {
        let BookingProfit {
            revenue,
            tax,
            driver_payout,
            ad_spend,
            profit,
        } = self.totals;
        let margin = if revenue.is_zero() {
            0.0
        } else {
            (profit / revenue).to_f64().unwrap_or(0.0)
        };
        let average_order_value = if self.count == 0 {
            Decimal::ZERO
        } else {
            (revenue / Decimal::from(self.count)).round_dp(2)
        };
        ProfitFigures {
            revenue: revenue.round_dp(2),
            tax: tax.round_dp(2),
            driver_payout: driver_payout.round_dp(2),
            ad_spend: ad_spend.round_dp(2),
            profit: profit.round_dp(2),
            margin,
            average_order_value,
            booking_count: self.count,
        }
    }
}
