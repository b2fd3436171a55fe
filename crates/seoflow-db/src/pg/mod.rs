//! Postgres-backed [`PipelineStore`].

mod imports;
mod records;
mod rollups;
mod runs;
mod topics;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use seoflow_core::{
    AdMetricRecord, BookingRecord, Draft, FeedType, FreshnessStatus, GateResult, ImportRun,
    MetricsRollup, PublishManifest, PublishedPage, SeoRun, Topic, TopicStatus,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::store::{BatchWrite, DuplicatePolicy, PipelineStore, TopicTransition};
use crate::DbError;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PipelineStore for PgStore {
    async fn create_import_run(&self, run: &ImportRun) -> Result<(), DbError> {
        imports::create_import_run(&self.pool, run).await
    }

    async fn finish_import_run(&self, run: &ImportRun) -> Result<(), DbError> {
        imports::finish_import_run(&self.pool, run).await
    }

    async fn get_import_run(&self, id: Uuid) -> Result<Option<ImportRun>, DbError> {
        imports::get_import_run(&self.pool, id).await
    }

    async fn list_import_runs(&self, limit: i64) -> Result<Vec<ImportRun>, DbError> {
        imports::list_import_runs(&self.pool, limit).await
    }

    async fn mark_import_rolled_back(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), DbError> {
        imports::mark_import_rolled_back(&self.pool, id, at).await
    }

    async fn latest_settled_import_at(
        &self,
        org: &str,
        feed_type: FeedType,
    ) -> Result<Option<DateTime<Utc>>, DbError> {
        imports::latest_settled_import_at(&self.pool, org, feed_type).await
    }

    async fn list_import_orgs(&self) -> Result<Vec<String>, DbError> {
        imports::list_import_orgs(&self.pool).await
    }

    async fn write_bookings(
        &self,
        rows: &[BookingRecord],
        policy: DuplicatePolicy,
    ) -> Result<BatchWrite, DbError> {
        records::write_bookings(&self.pool, rows, policy).await
    }

    async fn upsert_ad_metrics(&self, rows: &[AdMetricRecord]) -> Result<BatchWrite, DbError> {
        records::upsert_ad_metrics(&self.pool, rows).await
    }

    async fn delete_records_for_import(&self, run_id: Uuid) -> Result<u64, DbError> {
        records::delete_records_for_import(&self.pool, run_id).await
    }

    async fn list_settled_bookings(
        &self,
        org: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<BookingRecord>, DbError> {
        records::list_settled_bookings(&self.pool, org, from, to).await
    }

    async fn list_settled_ad_metrics(
        &self,
        org: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AdMetricRecord>, DbError> {
        records::list_settled_ad_metrics(&self.pool, org, from, to).await
    }

    async fn replace_rollups(
        &self,
        org: &str,
        from: NaiveDate,
        to: NaiveDate,
        rollups: &[MetricsRollup],
    ) -> Result<(), DbError> {
        rollups::replace_rollups(&self.pool, org, from, to, rollups).await
    }

    async fn list_rollups(
        &self,
        org: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<MetricsRollup>, DbError> {
        rollups::list_rollups(&self.pool, org, from, to).await
    }

    async fn insert_topic(&self, topic: &Topic) -> Result<bool, DbError> {
        topics::insert_topic(&self.pool, topic).await
    }

    async fn get_topic(&self, id: Uuid) -> Result<Option<Topic>, DbError> {
        topics::get_topic(&self.pool, id).await
    }

    async fn list_topics(
        &self,
        org: &str,
        status: Option<TopicStatus>,
    ) -> Result<Vec<Topic>, DbError> {
        topics::list_topics(&self.pool, org, status).await
    }

    async fn transition_topic(&self, change: &TopicTransition) -> Result<Topic, DbError> {
        topics::transition_topic(&self.pool, change).await
    }

    async fn latest_topic_created_at(
        &self,
        org: &str,
    ) -> Result<Option<DateTime<Utc>>, DbError> {
        topics::latest_topic_created_at(&self.pool, org).await
    }

    async fn list_published_pages(&self, org: &str) -> Result<Vec<PublishedPage>, DbError> {
        topics::list_published_pages(&self.pool, org).await
    }

    async fn put_draft(&self, draft: &Draft) -> Result<(), DbError> {
        topics::put_draft(&self.pool, draft).await
    }

    async fn get_draft(&self, topic_id: Uuid) -> Result<Option<Draft>, DbError> {
        topics::get_draft(&self.pool, topic_id).await
    }

    async fn append_gate_result(&self, result: &GateResult) -> Result<(), DbError> {
        topics::append_gate_result(&self.pool, result).await
    }

    async fn latest_gate_result(&self, topic_id: Uuid) -> Result<Option<GateResult>, DbError> {
        topics::latest_gate_result(&self.pool, topic_id).await
    }

    async fn insert_manifest(&self, manifest: &PublishManifest) -> Result<(), DbError> {
        runs::insert_manifest(&self.pool, manifest).await
    }

    async fn latest_manifest(&self, org: &str) -> Result<Option<PublishManifest>, DbError> {
        runs::latest_manifest(&self.pool, org).await
    }

    async fn insert_seo_run(&self, run: &SeoRun) -> Result<(), DbError> {
        runs::insert_seo_run(&self.pool, run).await
    }

    async fn list_seo_runs(&self, org: &str, limit: i64) -> Result<Vec<SeoRun>, DbError> {
        runs::list_seo_runs(&self.pool, org, limit).await
    }

    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<bool, DbError> {
        runs::try_acquire_lease(&self.pool, name, holder, ttl).await
    }

    async fn release_lease(&self, name: &str, holder: &str) -> Result<(), DbError> {
        runs::release_lease(&self.pool, name, holder).await
    }

    async fn insert_freshness_snapshot(
        &self,
        org: &str,
        statuses: &[FreshnessStatus],
    ) -> Result<(), DbError> {
        runs::insert_freshness_snapshot(&self.pool, org, statuses).await
    }

    async fn health_check(&self) -> Result<(), DbError> {
        crate::health_check(&self.pool).await
    }
}
