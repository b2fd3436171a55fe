use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use seoflow_core::{
    BookingRecord, Caller, MarginTable, MetricsRollup, Role, RollupKey, SegmentMetrics,
    SegmentType,
};
use seoflow_db::PipelineStore;
use serde::Serialize;

use crate::attribution::{AdSpendAttribution, Attributed, NoAttribution};
use crate::profit::price_bookings;
use crate::segments::{breakdown_by_segment, daily_rollups};
use crate::MetricsError;

const DEFAULT_ATTRIBUTION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSummary {
    pub computed: usize,
}

/// Aggregates settled records into rollups. Holds no accumulating state:
/// the same records always produce the same rollups.
#[derive(Clone)]
pub struct MetricsEngine {
    store: Arc<dyn PipelineStore>,
    margins: MarginTable,
    attribution: Arc<dyn AdSpendAttribution>,
    attribution_timeout: Duration,
}

impl MetricsEngine {
    /// Engine with [`NoAttribution`] and the default attribution timeout.
    #[must_use]
    pub fn new(store: Arc<dyn PipelineStore>, margins: MarginTable) -> Self {
        Self {
            store,
            margins,
            attribution: Arc::new(NoAttribution),
            attribution_timeout: DEFAULT_ATTRIBUTION_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_attribution(mut self, attribution: Arc<dyn AdSpendAttribution>) -> Self {
        self.attribution = attribution;
        self
    }

    #[must_use]
    pub fn with_attribution_timeout(mut self, timeout: Duration) -> Self {
        self.attribution_timeout = timeout;
        self
    }

    /// Daily rollups plus every segment breakdown for `[from, to]`, computed
    /// from settled records only. Nothing is written.
    ///
    /// # Errors
    ///
    /// [`MetricsError::InvalidRange`], attribution failures and timeouts, and
    /// store errors.
    pub async fn compute_rollups(
        &self,
        org: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<MetricsRollup>, MetricsError> {
        let (bookings, attributed) = self.load(org, from, to).await?;
        let priced = price_bookings(&bookings, &self.margins, &attributed);

        let mut rollups: Vec<MetricsRollup> = daily_rollups(&priced)
            .into_iter()
            .map(|(date, figures)| MetricsRollup {
                org: org.to_string(),
                period_start: from,
                period_end: to,
                key: RollupKey::Daily { date },
                figures,
            })
            .collect();

        for segment_type in SegmentType::ALL {
            rollups.extend(breakdown_by_segment(&priced, segment_type).into_iter().map(
                |segment| MetricsRollup {
                    org: org.to_string(),
                    period_start: from,
                    period_end: to,
                    key: RollupKey::Segment {
                        segment_type: segment.segment_type,
                        segment_value: segment.segment_value,
                    },
                    figures: segment.figures,
                },
            ));
        }

        tracing::debug!(
            org,
            %from,
            %to,
            bookings = bookings.len(),
            attributed_spend = %attributed.total(),
            rollups = rollups.len(),
            "rollups computed"
        );
        Ok(rollups)
    }

    /// Recomputes and replaces the stored rollups for `(org, from, to)`.
    ///
    /// # Errors
    ///
    /// Authorization, [`Self::compute_rollups`] errors, and store errors. On
    /// error the previously stored rollups are left in place.
    pub async fn compute_metrics(
        &self,
        caller: &Caller,
        org: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<MetricsSummary, MetricsError> {
        caller.require(Role::Admin)?;
        let rollups = self.compute_rollups(org, from, to).await?;
        self.store.replace_rollups(org, from, to, &rollups).await?;
        tracing::info!(org, %from, %to, computed = rollups.len(), "metrics refreshed");
        Ok(MetricsSummary {
            computed: rollups.len(),
        })
    }

    /// Stored segment figures for one dimension, in the same order
    /// [`breakdown_by_segment`] returns them.
    ///
    /// # Errors
    ///
    /// Authorization and store errors.
    pub async fn stored_segments(
        &self,
        caller: &Caller,
        org: &str,
        from: NaiveDate,
        to: NaiveDate,
        segment_type: SegmentType,
    ) -> Result<Vec<SegmentMetrics>, MetricsError> {
        caller.require(Role::Viewer)?;
        let mut segments: Vec<SegmentMetrics> = self
            .store
            .list_rollups(org, from, to)
            .await?
            .into_iter()
            .filter_map(|rollup| match rollup.key {
                RollupKey::Segment {
                    segment_type: stored,
                    segment_value,
                } if stored == segment_type => Some(SegmentMetrics {
                    segment_type,
                    segment_value,
                    figures: rollup.figures,
                }),
                _ => None,
            })
            .collect();
        if segment_type == SegmentType::City {
            segments.sort_by(|a, b| {
                b.figures
                    .profit
                    .cmp(&a.figures.profit)
                    .then_with(|| a.segment_value.cmp(&b.segment_value))
            });
        } else {
            segments.sort_by(|a, b| a.segment_value.cmp(&b.segment_value));
        }
        Ok(segments)
    }

    /// Fresh segment figures straight from records, for proposal ranking.
    ///
    /// # Errors
    ///
    /// Same as [`Self::compute_rollups`].
    pub async fn live_segments(
        &self,
        org: &str,
        from: NaiveDate,
        to: NaiveDate,
        segment_type: SegmentType,
    ) -> Result<Vec<SegmentMetrics>, MetricsError> {
        let (bookings, attributed) = self.load(org, from, to).await?;
        let priced = price_bookings(&bookings, &self.margins, &attributed);
        Ok(breakdown_by_segment(&priced, segment_type))
    }

    /// Settled bookings in range and the ad spend attributed to them.
    async fn load(
        &self,
        org: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<(Vec<BookingRecord>, Attributed), MetricsError> {
        if from > to {
            return Err(MetricsError::InvalidRange { from, to });
        }
        let bookings = self.store.list_settled_bookings(org, from, to).await?;
        let ads = self.store.list_settled_ad_metrics(org, from, to).await?;
        let attributed = match tokio::time::timeout(
            self.attribution_timeout,
            self.attribution.attribute(&bookings, &ads),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                tracing::error!(
                    strategy = self.attribution.name(),
                    timeout_secs = self.attribution_timeout.as_secs(),
                    "ad-spend attribution timed out"
                );
                return Err(MetricsError::AttributionTimeout {
                    timeout_secs: self.attribution_timeout.as_secs(),
                });
            }
        };
        Ok((bookings, attributed))
    }
}
