//! Publish manifests, SEO run audit, pipeline leases, freshness snapshots.

use std::time::Duration;

use chrono::{DateTime, Utc};
use seoflow_core::{FreshnessStatus, PublishManifest, SeoRun, SkippedTopic};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

#[derive(Debug, sqlx::FromRow)]
struct ManifestRow {
    id: Uuid,
    org: String,
    published_at: DateTime<Utc>,
    topic_ids: Vec<Uuid>,
    published_count: i64,
    candidate_count: i64,
    skipped: Json<Vec<SkippedTopic>>,
    published_by: String,
}

impl From<ManifestRow> for PublishManifest {
    fn from(row: ManifestRow) -> Self {
        PublishManifest {
            id: row.id,
            org: row.org,
            published_at: row.published_at,
            topic_ids: row.topic_ids,
            published_count: row.published_count,
            candidate_count: row.candidate_count,
            skipped: row.skipped.0,
            published_by: row.published_by,
        }
    }
}

pub(super) async fn insert_manifest(
    pool: &PgPool,
    manifest: &PublishManifest,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO seo_publish_manifests \
             (id, org, published_at, topic_ids, published_count, candidate_count, skipped, \
              published_by) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(manifest.id)
    .bind(&manifest.org)
    .bind(manifest.published_at)
    .bind(&manifest.topic_ids)
    .bind(manifest.published_count)
    .bind(manifest.candidate_count)
    .bind(Json(&manifest.skipped))
    .bind(&manifest.published_by)
    .execute(pool)
    .await?;
    Ok(())
}

pub(super) async fn latest_manifest(
    pool: &PgPool,
    org: &str,
) -> Result<Option<PublishManifest>, DbError> {
    let row = sqlx::query_as::<_, ManifestRow>(
        "SELECT id, org, published_at, topic_ids, published_count, candidate_count, skipped, \
                published_by \
         FROM seo_publish_manifests WHERE org = $1 \
         ORDER BY published_at DESC LIMIT 1",
    )
    .bind(org)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(PublishManifest::from))
}

#[derive(Debug, sqlx::FromRow)]
struct SeoRunRow {
    id: Uuid,
    org: String,
    kind: String,
    status: String,
    items_processed: i64,
    items_failed: i64,
    fail_reasons: Json<Vec<String>>,
    triggered_by: String,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
}

impl TryFrom<SeoRunRow> for SeoRun {
    type Error = DbError;

    fn try_from(row: SeoRunRow) -> Result<Self, Self::Error> {
        Ok(SeoRun {
            id: row.id,
            org: row.org,
            kind: row.kind.parse().map_err(|e| DbError::decode("seo run", e))?,
            status: row.status,
            items_processed: row.items_processed,
            items_failed: row.items_failed,
            fail_reasons: row.fail_reasons.0,
            triggered_by: row.triggered_by,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

pub(super) async fn insert_seo_run(pool: &PgPool, run: &SeoRun) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO seo_runs \
             (id, org, kind, status, items_processed, items_failed, fail_reasons, \
              triggered_by, started_at, completed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(run.id)
    .bind(&run.org)
    .bind(run.kind.as_str())
    .bind(&run.status)
    .bind(run.items_processed)
    .bind(run.items_failed)
    .bind(Json(&run.fail_reasons))
    .bind(&run.triggered_by)
    .bind(run.started_at)
    .bind(run.completed_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub(super) async fn list_seo_runs(
    pool: &PgPool,
    org: &str,
    limit: i64,
) -> Result<Vec<SeoRun>, DbError> {
    let rows = sqlx::query_as::<_, SeoRunRow>(
        "SELECT id, org, kind, status, items_processed, items_failed, fail_reasons, \
                triggered_by, started_at, completed_at \
         FROM seo_runs WHERE org = $1 \
         ORDER BY started_at DESC LIMIT $2",
    )
    .bind(org)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(SeoRun::try_from).collect()
}

/// Upsert that only overwrites the row when it is expired or already ours.
pub(super) async fn try_acquire_lease(
    pool: &PgPool,
    name: &str,
    holder: &str,
    ttl: Duration,
) -> Result<bool, DbError> {
    let ttl_secs = ttl.as_secs_f64();
    let acquired = sqlx::query_scalar::<_, String>(
        "INSERT INTO pipeline_leases (name, holder, acquired_at, expires_at) \
         VALUES ($1, $2, NOW(), NOW() + make_interval(secs => $3)) \
         ON CONFLICT (name) DO UPDATE SET \
             holder = EXCLUDED.holder, \
             acquired_at = EXCLUDED.acquired_at, \
             expires_at = EXCLUDED.expires_at \
         WHERE pipeline_leases.expires_at <= NOW() OR pipeline_leases.holder = EXCLUDED.holder \
         RETURNING name",
    )
    .bind(name)
    .bind(holder)
    .bind(ttl_secs)
    .fetch_optional(pool)
    .await?;
    Ok(acquired.is_some())
}

pub(super) async fn release_lease(pool: &PgPool, name: &str, holder: &str) -> Result<(), DbError> {
    sqlx::query("DELETE FROM pipeline_leases WHERE name = $1 AND holder = $2")
        .bind(name)
        .bind(holder)
        .execute(pool)
        .await?;
    Ok(())
}

pub(super) async fn insert_freshness_snapshot(
    pool: &PgPool,
    org: &str,
    statuses: &[FreshnessStatus],
) -> Result<(), DbError> {
    if statuses.is_empty() {
        return Ok(());
    }
    let sources: Vec<String> = statuses.iter().map(|s| s.source.clone()).collect();
    let classes: Vec<String> = statuses
        .iter()
        .map(|s| s.class.as_str().to_string())
        .collect();
    let last_updated: Vec<Option<DateTime<Utc>>> =
        statuses.iter().map(|s| s.last_updated).collect();
    let ages: Vec<Option<f64>> = statuses.iter().map(|s| s.age_hours).collect();
    let states: Vec<String> = statuses
        .iter()
        .map(|s| s.status.as_str().to_string())
        .collect();
    let checked: Vec<DateTime<Utc>> = statuses.iter().map(|s| s.checked_at).collect();

    sqlx::query(
        "INSERT INTO freshness_snapshots \
             (org, source, class, last_updated, age_hours, status, checked_at) \
         SELECT $1, * FROM UNNEST($2::text[], $3::text[], $4::timestamptz[], $5::float8[], \
                                  $6::text[], $7::timestamptz[])",
    )
    .bind(org)
    .bind(&sources)
    .bind(&classes)
    .bind(&last_updated)
    .bind(&ages)
    .bind(&states)
    .bind(&checked)
    .execute(pool)
    .await?;
    Ok(())
}
