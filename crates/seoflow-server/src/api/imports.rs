use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use seoflow_core::{Caller, ImportRun};
use seoflow_ingest::{FeedRequest, ImportSummary, RollbackOutcome};
use serde::Deserialize;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_ingest_error, normalize_limit, require_org, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct ImportFeedRequest {
    pub org: String,
    pub source_label: String,
    /// Header row first, then one entry per data row.
    pub rows: Vec<Vec<String>>,
    #[serde(default)]
    pub allow_overwrite: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct ImportsQuery {
    pub limit: Option<i64>,
}

impl ImportFeedRequest {
    fn into_feed(self, req_id: &str) -> Result<FeedRequest, ApiError> {
        let org = require_org(req_id, &self.org)?;
        let label = self.source_label.trim();
        if label.is_empty() {
            return Err(ApiError::new(
                req_id,
                "validation_error",
                "source_label is required",
            ));
        }
        let feed = FeedRequest::new(org, label, self.rows);
        Ok(if self.allow_overwrite {
            feed.allow_overwrite()
        } else {
            feed
        })
    }
}

pub(super) async fn import_bookings(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<ImportFeedRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ImportSummary>>), ApiError> {
    let feed = body.into_feed(&req_id.0)?;
    let summary = state
        .ingest
        .import_booking_feed(&caller, feed)
        .await
        .map_err(|e| map_ingest_error(req_id.0.clone(), &e))?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(req_id.0, summary)),
    ))
}

pub(super) async fn import_ads(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<ImportFeedRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ImportSummary>>), ApiError> {
    let feed = body.into_feed(&req_id.0)?;
    let summary = state
        .ingest
        .import_ad_spend_feed(&caller, feed)
        .await
        .map_err(|e| map_ingest_error(req_id.0.clone(), &e))?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(req_id.0, summary)),
    ))
}

pub(super) async fn list_imports(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ImportsQuery>,
) -> Result<Json<ApiResponse<Vec<ImportRun>>>, ApiError> {
    let runs = state
        .ingest
        .list_imports(&caller, normalize_limit(query.limit))
        .await
        .map_err(|e| map_ingest_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(req_id.0, runs)))
}

pub(super) async fn rollback_import(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    Path(import_id): Path<Uuid>,
) -> Result<Json<ApiResponse<RollbackOutcome>>, ApiError> {
    let outcome = state
        .ingest
        .rollback(&caller, import_id)
        .await
        .map_err(|e| map_ingest_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(req_id.0, outcome)))
}
