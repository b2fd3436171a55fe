//! Metrics/Profit Engine.
//!
//! Turns settled booking and ad-spend records into daily rollups and
//! per-segment profit figures using the proxy formula
//! `revenue - revenue*tax_rate - base_rate*payout_rate - attributed_ad_spend`.
//! Everything here is a pure function of stored records.

pub mod attribution;
pub mod engine;
pub mod error;
pub mod opportunity;
pub mod profit;
pub mod segments;

pub use attribution::{
    attribution_for, AdSpendAttribution, Attributed, NoAttribution, RevenueShareAttribution,
};
pub use engine::{MetricsEngine, MetricsSummary};
pub use error::MetricsError;
pub use opportunity::{score_opportunities, SegmentOpportunity};
pub use profit::{booking_profit, price_bookings, BookingProfit, FiguresBuilder, PricedBooking};
pub use segments::{breakdown_by_segment, daily_rollups};
