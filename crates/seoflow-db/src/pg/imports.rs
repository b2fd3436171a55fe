//! `imports` table operations.

use chrono::{DateTime, Utc};
use seoflow_core::{FeedType, ImportRun, ImportStatus, RowIssue};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const IMPORT_COLUMNS: &str = "id, org, feed_type, source_label, status, total_rows, \
     imported_count, updated_count, skipped_count, error_count, warning_count, \
     error_samples, warning_samples, created_by, started_at, completed_at, rolled_back_at";

#[derive(Debug, sqlx::FromRow)]
struct ImportRunRow {
    id: Uuid,
    org: String,
    feed_type: String,
    source_label: String,
    status: String,
    total_rows: i64,
    imported_count: i64,
    updated_count: i64,
    skipped_count: i64,
    error_count: i64,
    warning_count: i64,
    error_samples: Json<Vec<RowIssue>>,
    warning_samples: Json<Vec<RowIssue>>,
    created_by: Option<String>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    rolled_back_at: Option<DateTime<Utc>>,
}

impl TryFrom<ImportRunRow> for ImportRun {
    type Error = DbError;

    fn try_from(row: ImportRunRow) -> Result<Self, Self::Error> {
        Ok(ImportRun {
            id: row.id,
            org: row.org,
            feed_type: row
                .feed_type
                .parse()
                .map_err(|e| DbError::decode("import run", e))?,
            source_label: row.source_label,
            status: row
                .status
                .parse()
                .map_err(|e| DbError::decode("import run", e))?,
            total_rows: row.total_rows,
            imported_count: row.imported_count,
            updated_count: row.updated_count,
            skipped_count: row.skipped_count,
            error_count: row.error_count,
            warning_count: row.warning_count,
            error_samples: row.error_samples.0,
            warning_samples: row.warning_samples.0,
            created_by: row.created_by,
            started_at: row.started_at,
            completed_at: row.completed_at,
            rolled_back_at: row.rolled_back_at,
        })
    }
}

pub(super) async fn create_import_run(pool: &PgPool, run: &ImportRun) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO imports \
             (id, org, feed_type, source_label, status, total_rows, created_by, started_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(run.id)
    .bind(&run.org)
    .bind(run.feed_type.as_str())
    .bind(&run.source_label)
    .bind(run.status.as_str())
    .bind(run.total_rows)
    .bind(&run.created_by)
    .bind(run.started_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub(super) async fn finish_import_run(pool: &PgPool, run: &ImportRun) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE imports SET \
             status = $2, total_rows = $3, imported_count = $4, updated_count = $5, \
             skipped_count = $6, error_count = $7, warning_count = $8, \
             error_samples = $9, warning_samples = $10, completed_at = $11 \
         WHERE id = $1 AND status = 'processing'",
    )
    .bind(run.id)
    .bind(run.status.as_str())
    .bind(run.total_rows)
    .bind(run.imported_count)
    .bind(run.updated_count)
    .bind(run.skipped_count)
    .bind(run.error_count)
    .bind(run.warning_count)
    .bind(Json(&run.error_samples))
    .bind(Json(&run.warning_samples))
    .bind(run.completed_at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidTransition {
            entity: "import run",
            id: run.id.to_string(),
            expected: ImportStatus::Processing.to_string(),
        });
    }
    Ok(())
}

pub(super) async fn get_import_run(pool: &PgPool, id: Uuid) -> Result<Option<ImportRun>, DbError> {
    let row = sqlx::query_as::<_, ImportRunRow>(&format!(
        "SELECT {IMPORT_COLUMNS} FROM imports WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(ImportRun::try_from).transpose()
}

pub(super) async fn list_import_runs(pool: &PgPool, limit: i64) -> Result<Vec<ImportRun>, DbError> {
    let rows = sqlx::query_as::<_, ImportRunRow>(&format!(
        "SELECT {IMPORT_COLUMNS} FROM imports ORDER BY started_at DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(ImportRun::try_from).collect()
}

pub(super) async fn mark_import_rolled_back(
    pool: &PgPool,
    id: Uuid,
    at: DateTime<Utc>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE imports SET status = 'rolled_back', rolled_back_at = $2 \
         WHERE id = $1 AND status IN ('completed', 'completed_with_errors')",
    )
    .bind(id)
    .bind(at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidTransition {
            entity: "import run",
            id: id.to_string(),
            expected: "completed or completed_with_errors".to_string(),
        });
    }
    Ok(())
}

pub(super) async fn latest_settled_import_at(
    pool: &PgPool,
    org: &str,
    feed_type: FeedType,
) -> Result<Option<DateTime<Utc>>, DbError> {
    let latest = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
        "SELECT MAX(completed_at) FROM imports \
         WHERE org = $1 AND feed_type = $2 \
           AND status IN ('completed', 'completed_with_errors')",
    )
    .bind(org)
    .bind(feed_type.as_str())
    .fetch_one(pool)
    .await?;
    Ok(latest)
}

pub(super) async fn list_import_orgs(pool: &PgPool) -> Result<Vec<String>, DbError> {
    let orgs = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT org FROM imports \
         WHERE status IN ('completed', 'completed_with_errors') ORDER BY org",
    )
    .fetch_all(pool)
    .await?;
    Ok(orgs)
}
