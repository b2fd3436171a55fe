//! Content opportunity scoring over segment breakdowns.
//!
//! `score = 0.4*norm(profit) + 0.3*norm(booking_count) + 0.3*(1 - coverage)`,
//! clipped to `[0, 1]`. `norm` divides by the largest value in the
//! candidate set, so the top segment on each axis scores 1; negative profit
//! normalizes to 0.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use seoflow_core::{SegmentMetrics, SegmentType};

const PROFIT_WEIGHT: f64 = 0.4;
const VOLUME_WEIGHT: f64 = 0.3;
const GAP_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentOpportunity {
    pub segment_type: SegmentType,
    pub segment_value: String,
    pub profit: Decimal,
    pub booking_count: i64,
    /// Share of this segment already covered by content, in `[0, 1]`.
    pub content_coverage: f64,
    pub score: f64,
}

impl SegmentOpportunity {
    /// Score on the 0-100 scale topics carry.
    #[must_use]
    pub fn profit_score(&self) -> f64 {
        (self.score * 100.0).clamp(0.0, 100.0)
    }
}

fn normalize(value: f64, max: f64) -> f64 {
    if max <= 0.0 {
        0.0
    } else {
        (value.max(0.0) / max).clamp(0.0, 1.0)
    }
}

/// Highest score first; ties broken by segment value.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score_opportunities<F>(segments: &[SegmentMetrics], coverage: F) -> Vec<SegmentOpportunity>
where
    F: Fn(&SegmentMetrics) -> f64,
{
    let profit_of = |s: &SegmentMetrics| s.figures.profit.to_f64().unwrap_or(0.0);
    let max_profit = segments.iter().map(profit_of).fold(0.0_f64, f64::max);
    let max_volume = segments
        .iter()
        .map(|s| s.figures.booking_count as f64)
        .fold(0.0_f64, f64::max);

    let mut scored: Vec<SegmentOpportunity> = segments
        .iter()
        .map(|s| {
            let content_coverage = coverage(s).clamp(0.0, 1.0);
            let score = PROFIT_WEIGHT * normalize(profit_of(s), max_profit)
                + VOLUME_WEIGHT * normalize(s.figures.booking_count as f64, max_volume)
                + GAP_WEIGHT * (1.0 - content_coverage);
            SegmentOpportunity {
                segment_type: s.segment_type,
                segment_value: s.segment_value.clone(),
                profit: s.figures.profit,
                booking_count: s.figures.booking_count,
                content_coverage,
                score: score.clamp(0.0, 1.0),
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.segment_value.cmp(&b.segment_value))
    });
    scored
}
