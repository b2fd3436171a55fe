//! The storage seam every pipeline component talks to.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use seoflow_core::{
    AdMetricRecord, BookingRecord, Draft, FeedType, FreshnessStatus, GateResult, ImportRun,
    MetricsRollup, PublishManifest, PublishedPage, SeoRun, Topic, TopicStatus,
};
use uuid::Uuid;

use crate::DbError;

/// Lease shared by publish and rollback so the two never overlap.
pub const PIPELINE_LEASE: &str = "pipeline";

/// What to do when a booking's natural key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    #[default]
    Skip,
    Overwrite,
}

/// Outcome of writing one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchWrite {
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
}

impl std::ops::AddAssign for BatchWrite {
    fn add_assign(&mut self, rhs: Self) {
        self.inserted += rhs.inserted;
        self.updated += rhs.updated;
        self.skipped += rhs.skipped;
    }
}

/// A compare-and-set status change. Applied only when the stored status
/// still equals `from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicTransition {
    pub topic_id: Uuid,
    pub from: TopicStatus,
    pub to: TopicStatus,
    pub at: DateTime<Utc>,
    /// Stamped onto the topic with `approved_at = at` when moving to `ready`.
    pub approved_by: Option<String>,
    /// Stored when moving to `rejected`.
    pub rejection_reason: Option<String>,
}

impl TopicTransition {
    #[must_use]
    pub fn new(topic_id: Uuid, from: TopicStatus, to: TopicStatus, at: DateTime<Utc>) -> Self {
        Self {
            topic_id,
            from,
            to,
            at,
            approved_by: None,
            rejection_reason: None,
        }
    }

    #[must_use]
    pub fn approved_by(mut self, approver: impl Into<String>) -> Self {
        self.approved_by = Some(approver.into());
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.rejection_reason = Some(reason.into());
        self
    }
}

#[async_trait]
pub trait PipelineStore: Send + Sync {
    // imports

    async fn create_import_run(&self, run: &ImportRun) -> Result<(), DbError>;

    /// Moves a `processing` run to its final status and counts.
    ///
    /// # Errors
    ///
    /// [`DbError::InvalidTransition`] if the run is no longer processing.
    async fn finish_import_run(&self, run: &ImportRun) -> Result<(), DbError>;

    async fn get_import_run(&self, id: Uuid) -> Result<Option<ImportRun>, DbError>;

    /// Newest first.
    async fn list_import_runs(&self, limit: i64) -> Result<Vec<ImportRun>, DbError>;

    /// Moves a settled run to `rolled_back`.
    ///
    /// # Errors
    ///
    /// [`DbError::InvalidTransition`] if the run is not settled.
    async fn mark_import_rolled_back(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), DbError>;

    /// Completion time of the org's newest settled import of `feed_type`.
    async fn latest_settled_import_at(
        &self,
        org: &str,
        feed_type: FeedType,
    ) -> Result<Option<DateTime<Utc>>, DbError>;

    /// Orgs with at least one settled import.
    async fn list_import_orgs(&self) -> Result<Vec<String>, DbError>;

    // records

    /// Writes one batch atomically. Keys must be unique within `rows`.
    async fn write_bookings(
        &self,
        rows: &[BookingRecord],
        policy: DuplicatePolicy,
    ) -> Result<BatchWrite, DbError>;

    /// Merges one batch by `(campaign_id, metric_date)`, last write wins.
    async fn upsert_ad_metrics(&self, rows: &[AdMetricRecord]) -> Result<BatchWrite, DbError>;

    /// Deletes every booking and ad row owned by `run_id`; returns the count.
    async fn delete_records_for_import(&self, run_id: Uuid) -> Result<u64, DbError>;

    /// Bookings with a pickup date in `[from, to]` whose owning import is settled.
    async fn list_settled_bookings(
        &self,
        org: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<BookingRecord>, DbError>;

    async fn list_settled_ad_metrics(
        &self,
        org: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AdMetricRecord>, DbError>;

    // rollups

    /// Replaces every stored rollup for exactly this `(org, from, to)`.
    async fn replace_rollups(
        &self,
        org: &str,
        from: NaiveDate,
        to: NaiveDate,
        rollups: &[MetricsRollup],
    ) -> Result<(), DbError>;

    async fn list_rollups(
        &self,
        org: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<MetricsRollup>, DbError>;

    // topics

    /// Inserts unless `(org, normalized_keyword)` is already taken, in which
    /// case nothing is written and `false` is returned.
    async fn insert_topic(&self, topic: &Topic) -> Result<bool, DbError>;

    async fn get_topic(&self, id: Uuid) -> Result<Option<Topic>, DbError>;

    /// Highest profit score first.
    async fn list_topics(
        &self,
        org: &str,
        status: Option<TopicStatus>,
    ) -> Result<Vec<Topic>, DbError>;

    /// # Errors
    ///
    /// [`DbError::NotFound`] for an unknown topic, [`DbError::InvalidTransition`]
    /// when the stored status no longer equals `change.from`.
    async fn transition_topic(&self, change: &TopicTransition) -> Result<Topic, DbError>;

    async fn latest_topic_created_at(&self, org: &str) -> Result<Option<DateTime<Utc>>, DbError>;

    async fn list_published_pages(&self, org: &str) -> Result<Vec<PublishedPage>, DbError>;

    // drafts and gate history

    /// Stores the topic's draft, replacing any previous one.
    async fn put_draft(&self, draft: &Draft) -> Result<(), DbError>;

    async fn get_draft(&self, topic_id: Uuid) -> Result<Option<Draft>, DbError>;

    async fn append_gate_result(&self, result: &GateResult) -> Result<(), DbError>;

    /// Newest evaluation of the topic's current draft.
    async fn latest_gate_result(&self, topic_id: Uuid) -> Result<Option<GateResult>, DbError>;

    // manifests and run audit

    async fn insert_manifest(&self, manifest: &PublishManifest) -> Result<(), DbError>;

    async fn latest_manifest(&self, org: &str) -> Result<Option<PublishManifest>, DbError>;

    async fn insert_seo_run(&self, run: &SeoRun) -> Result<(), DbError>;

    /// Newest first.
    async fn list_seo_runs(&self, org: &str, limit: i64) -> Result<Vec<SeoRun>, DbError>;

    // leases

    /// Takes `name` for `holder` until `ttl` elapses. An expired lease held by
    /// someone else is taken over. Returns `false` when the lease is busy.
    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<bool, DbError>;

    /// Releases `name` if `holder` still owns it.
    async fn release_lease(&self, name: &str, holder: &str) -> Result<(), DbError>;

    // freshness

    async fn insert_freshness_snapshot(
        &self,
        org: &str,
        statuses: &[FreshnessStatus],
    ) -> Result<(), DbError>;

    /// Confirms the backing store is reachable.
    async fn health_check(&self) -> Result<(), DbError> {
        Ok(())
    }
}
