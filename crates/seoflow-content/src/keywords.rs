//! Keyword research seam used to rank proposals.

use async_trait::async_trait;
use serde::Serialize;

use crate::ContentError;

const PROFIT_WEIGHT: f64 = 0.5;
const TRAFFIC_WEIGHT: f64 = 0.3;
const EASE_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordStats {
    pub monthly_volume: i64,
    /// 0-100, higher is harder to rank for.
    pub difficulty: f64,
    /// Related phrases, used as secondary keywords.
    pub related: Vec<String>,
}

impl Default for KeywordStats {
    fn default() -> Self {
        Self {
            monthly_volume: 0,
            difficulty: 50.0,
            related: Vec::new(),
        }
    }
}

#[async_trait]
pub trait KeywordResearch: Send + Sync {
    fn name(&self) -> &'static str;

    async fn lookup(&self, keyword: &str) -> Result<KeywordStats, ContentError>;
}

/// Reports no traffic and middling difficulty for every keyword.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoKeywordResearch;

#[async_trait]
impl KeywordResearch for NoKeywordResearch {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn lookup(&self, _keyword: &str) -> Result<KeywordStats, ContentError> {
        Ok(KeywordStats::default())
    }
}

/// `0.5*profit + 0.3*traffic + 0.2*(100 - difficulty)`, all on 0-100.
#[must_use]
pub fn rank_score(profit_score: f64, traffic_score: f64, difficulty: f64) -> f64 {
    PROFIT_WEIGHT * profit_score.clamp(0.0, 100.0)
        + TRAFFIC_WEIGHT * traffic_score.clamp(0.0, 100.0)
        + EASE_WEIGHT * (100.0 - difficulty.clamp(0.0, 100.0))
}

/// Volume as a 0-100 share of the largest volume among the candidates.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn traffic_score(volume: i64, max_volume: i64) -> f64 {
    if max_volume <= 0 {
        0.0
    } else {
        (volume.max(0) as f64 / max_volume as f64 * 100.0).clamp(0.0, 100.0)
    }
}
