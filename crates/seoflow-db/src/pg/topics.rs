//! `seo_topics`, `seo_drafts`, and `seo_gate_results` operations.

use chrono::{DateTime, Utc};
use seoflow_core::{
    CategoryResult, Draft, DraftContent, GateResult, PublishedPage, Topic, TopicStatus,
};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::store::TopicTransition;
use crate::DbError;

const TOPIC_COLUMNS: &str = "id, org, title, slug, page_type, site_slug, primary_keyword, \
     normalized_keyword, secondary_keywords, target_url, status, profit_score, \
     estimated_traffic, difficulty, segment_type, segment_value, approved_by, approved_at, \
     rejection_reason, published_at, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct TopicRow {
    id: Uuid,
    org: String,
    title: String,
    slug: String,
    page_type: String,
    site_slug: String,
    primary_keyword: String,
    normalized_keyword: String,
    secondary_keywords: Vec<String>,
    target_url: String,
    status: String,
    profit_score: f64,
    estimated_traffic: i64,
    difficulty: f64,
    segment_type: Option<String>,
    segment_value: Option<String>,
    approved_by: Option<String>,
    approved_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    published_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TopicRow> for Topic {
    type Error = DbError;

    fn try_from(row: TopicRow) -> Result<Self, Self::Error> {
        let decode = |e: seoflow_core::CoreError| DbError::decode("topic", e);
        Ok(Topic {
            id: row.id,
            org: row.org,
            title: row.title,
            slug: row.slug,
            page_type: row.page_type.parse().map_err(decode)?,
            site_slug: row.site_slug,
            primary_keyword: row.primary_keyword,
            normalized_keyword: row.normalized_keyword,
            secondary_keywords: row.secondary_keywords,
            target_url: row.target_url,
            status: row.status.parse().map_err(decode)?,
            profit_score: row.profit_score,
            estimated_traffic: row.estimated_traffic,
            difficulty: row.difficulty,
            segment_type: row
                .segment_type
                .map(|s| s.parse())
                .transpose()
                .map_err(decode)?,
            segment_value: row.segment_value,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            rejection_reason: row.rejection_reason,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(super) async fn insert_topic(pool: &PgPool, topic: &Topic) -> Result<bool, DbError> {
    let inserted = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO seo_topics \
             (id, org, title, slug, page_type, site_slug, primary_keyword, normalized_keyword, \
              secondary_keywords, target_url, status, profit_score, estimated_traffic, \
              difficulty, segment_type, segment_value, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
         ON CONFLICT (org, normalized_keyword) DO NOTHING \
         RETURNING id",
    )
    .bind(topic.id)
    .bind(&topic.org)
    .bind(&topic.title)
    .bind(&topic.slug)
    .bind(topic.page_type.as_str())
    .bind(&topic.site_slug)
    .bind(&topic.primary_keyword)
    .bind(&topic.normalized_keyword)
    .bind(&topic.secondary_keywords)
    .bind(&topic.target_url)
    .bind(topic.status.as_str())
    .bind(topic.profit_score)
    .bind(topic.estimated_traffic)
    .bind(topic.difficulty)
    .bind(topic.segment_type.map(|s| s.as_str()))
    .bind(&topic.segment_value)
    .bind(topic.created_at)
    .bind(topic.updated_at)
    .fetch_optional(pool)
    .await?;
    Ok(inserted.is_some())
}

pub(super) async fn get_topic(pool: &PgPool, id: Uuid) -> Result<Option<Topic>, DbError> {
    let row = sqlx::query_as::<_, TopicRow>(&format!(
        "SELECT {TOPIC_COLUMNS} FROM seo_topics WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(Topic::try_from).transpose()
}

pub(super) async fn list_topics(
    pool: &PgPool,
    org: &str,
    status: Option<TopicStatus>,
) -> Result<Vec<Topic>, DbError> {
    let rows = sqlx::query_as::<_, TopicRow>(&format!(
        "SELECT {TOPIC_COLUMNS} FROM seo_topics \
         WHERE org = $1 AND ($2::text IS NULL OR status = $2) \
         ORDER BY profit_score DESC, created_at ASC"
    ))
    .bind(org)
    .bind(status.map(TopicStatus::as_str))
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(Topic::try_from).collect()
}

pub(super) async fn transition_topic(
    pool: &PgPool,
    change: &TopicTransition,
) -> Result<Topic, DbError> {
    let row = sqlx::query_as::<_, TopicRow>(&format!(
        "UPDATE seo_topics SET \
             status = $3, \
             updated_at = $4, \
             approved_by = CASE WHEN $3 = 'ready' AND $5::text IS NOT NULL THEN $5 ELSE approved_by END, \
             approved_at = CASE WHEN $3 = 'ready' AND $5::text IS NOT NULL THEN $4 ELSE approved_at END, \
             published_at = CASE WHEN $3 = 'published' THEN $4 ELSE published_at END, \
             rejection_reason = CASE WHEN $3 = 'rejected' THEN $6 ELSE rejection_reason END \
         WHERE id = $1 AND status = $2 \
         RETURNING {TOPIC_COLUMNS}"
    ))
    .bind(change.topic_id)
    .bind(change.from.as_str())
    .bind(change.to.as_str())
    .bind(change.at)
    .bind(&change.approved_by)
    .bind(&change.rejection_reason)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Topic::try_from(row),
        None => {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM seo_topics WHERE id = $1)",
            )
            .bind(change.topic_id)
            .fetch_one(pool)
            .await?;
            if exists {
                Err(DbError::InvalidTransition {
                    entity: "topic",
                    id: change.topic_id.to_string(),
                    expected: change.from.to_string(),
                })
            } else {
                Err(DbError::not_found("topic", change.topic_id))
            }
        }
    }
}

pub(super) async fn latest_topic_created_at(
    pool: &PgPool,
    org: &str,
) -> Result<Option<DateTime<Utc>>, DbError> {
    let latest = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
        "SELECT MAX(created_at) FROM seo_topics WHERE org = $1",
    )
    .bind(org)
    .fetch_one(pool)
    .await?;
    Ok(latest)
}

#[derive(Debug, sqlx::FromRow)]
struct PublishedPageRow {
    topic_id: Uuid,
    page_type: String,
    target_url: String,
    segment_value: Option<String>,
    content: Option<Json<DraftContent>>,
}

pub(super) async fn list_published_pages(
    pool: &PgPool,
    org: &str,
) -> Result<Vec<PublishedPage>, DbError> {
    let rows = sqlx::query_as::<_, PublishedPageRow>(
        "SELECT t.id AS topic_id, t.page_type, t.target_url, t.segment_value, d.content \
         FROM seo_topics t \
         LEFT JOIN seo_drafts d ON d.topic_id = t.id \
         WHERE t.org = $1 AND t.status = 'published' \
         ORDER BY t.published_at",
    )
    .bind(org)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            Ok(PublishedPage {
                topic_id: row.topic_id,
                page_type: row
                    .page_type
                    .parse()
                    .map_err(|e| DbError::decode("topic", e))?,
                target_url: row.target_url,
                segment_value: row.segment_value,
                body: row.content.map(|c| c.0.body).unwrap_or_default(),
            })
        })
        .collect()
}

#[derive(Debug, sqlx::FromRow)]
struct DraftRow {
    id: Uuid,
    topic_id: Uuid,
    content: Json<DraftContent>,
    word_count: i64,
    generated_at: DateTime<Utc>,
}

impl From<DraftRow> for Draft {
    fn from(row: DraftRow) -> Self {
        Draft {
            id: row.id,
            topic_id: row.topic_id,
            content: row.content.0,
            word_count: row.word_count,
            generated_at: row.generated_at,
        }
    }
}

pub(super) async fn put_draft(pool: &PgPool, draft: &Draft) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO seo_drafts (id, topic_id, content, word_count, generated_at) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (topic_id) DO UPDATE SET \
             id = EXCLUDED.id, \
             content = EXCLUDED.content, \
             word_count = EXCLUDED.word_count, \
             generated_at = EXCLUDED.generated_at",
    )
    .bind(draft.id)
    .bind(draft.topic_id)
    .bind(Json(&draft.content))
    .bind(draft.word_count)
    .bind(draft.generated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub(super) async fn get_draft(pool: &PgPool, topic_id: Uuid) -> Result<Option<Draft>, DbError> {
    let row = sqlx::query_as::<_, DraftRow>(
        "SELECT id, topic_id, content, word_count, generated_at \
         FROM seo_drafts WHERE topic_id = $1",
    )
    .bind(topic_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Draft::from))
}

#[derive(Debug, sqlx::FromRow)]
struct GateResultRow {
    id: Uuid,
    topic_id: Uuid,
    draft_id: Uuid,
    categories: Json<Vec<CategoryResult>>,
    overall_status: String,
    suggestions: Json<Vec<String>>,
    evaluated_at: DateTime<Utc>,
}

impl TryFrom<GateResultRow> for GateResult {
    type Error = DbError;

    fn try_from(row: GateResultRow) -> Result<Self, Self::Error> {
        let overall_status = match row.overall_status.as_str() {
            "passed" => seoflow_core::GateStatus::Passed,
            "warned" => seoflow_core::GateStatus::Warned,
            "failed" => seoflow_core::GateStatus::Failed,
            other => {
                return Err(DbError::decode(
                    "gate result",
                    format!("unknown status '{other}'"),
                ))
            }
        };
        Ok(GateResult {
            id: row.id,
            topic_id: row.topic_id,
            draft_id: row.draft_id,
            categories: row.categories.0,
            overall_status,
            suggestions: row.suggestions.0,
            evaluated_at: row.evaluated_at,
        })
    }
}

pub(super) async fn append_gate_result(pool: &PgPool, result: &GateResult) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO seo_gate_results \
             (id, topic_id, draft_id, categories, overall_status, suggestions, evaluated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(result.id)
    .bind(result.topic_id)
    .bind(result.draft_id)
    .bind(Json(&result.categories))
    .bind(result.overall_status.as_str())
    .bind(Json(&result.suggestions))
    .bind(result.evaluated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub(super) async fn latest_gate_result(
    pool: &PgPool,
    topic_id: Uuid,
) -> Result<Option<GateResult>, DbError> {
    let row = sqlx::query_as::<_, GateResultRow>(
        "SELECT g.id, g.topic_id, g.draft_id, g.categories, g.overall_status, g.suggestions, \
                g.evaluated_at \
         FROM seo_gate_results g \
         JOIN seo_drafts d ON d.id = g.draft_id \
         WHERE d.topic_id = $1 \
         ORDER BY g.evaluated_at DESC \
         LIMIT 1",
    )
    .bind(topic_id)
    .fetch_optional(pool)
    .await?;
    row.map(GateResult::try_from).transpose()
}
