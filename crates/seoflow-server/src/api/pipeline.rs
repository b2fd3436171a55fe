//! Pipeline-wide operations: gate runs, publishing, freshness, run audit.

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use seoflow_content::{should_freeze, GateRunSummary, PublishOutcome};
use seoflow_core::{Caller, FreshnessStatus, Role, SeoRun};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{
    map_content_error, map_core_error, map_db_error, normalize_limit, require_org, ApiError,
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub(super) struct OrgRequest {
    pub org: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct PublishRequest {
    pub org: String,
    /// Capped by the cadence policy either way.
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RunsQuery {
    pub org: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct FreshnessReport {
    org: String,
    frozen: bool,
    sources: Vec<FreshnessStatus>,
}

pub(super) async fn run_quality_gate(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<OrgRequest>,
) -> Result<Json<ApiResponse<GateRunSummary>>, ApiError> {
    let org = require_org(&req_id.0, &body.org)?;
    let summary = state
        .topics
        .run_quality_gate(&caller, &org)
        .await
        .map_err(|e| map_content_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(req_id.0, summary)))
}

pub(super) async fn publish(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<PublishRequest>,
) -> Result<Json<ApiResponse<PublishOutcome>>, ApiError> {
    let org = require_org(&req_id.0, &body.org)?;
    let outcome = state
        .publisher
        .publish(&caller, &org, body.limit.unwrap_or(usize::MAX))
        .await
        .map_err(|e| map_content_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(req_id.0, outcome)))
}

pub(super) async fn check_freshness(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<OrgRequest>,
) -> Result<Json<ApiResponse<FreshnessReport>>, ApiError> {
    caller
        .require(Role::Viewer)
        .map_err(|e| map_core_error(req_id.0.clone(), &e))?;
    let org = require_org(&req_id.0, &query.org)?;
    let sources = state
        .freshness
        .check_all(&org)
        .await
        .map_err(|e| map_content_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(
        req_id.0,
        FreshnessReport {
            frozen: should_freeze(&sources),
            org,
            sources,
        },
    )))
}

pub(super) async fn list_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<ApiResponse<Vec<SeoRun>>>, ApiError> {
    caller
        .require(Role::Viewer)
        .map_err(|e| map_core_error(req_id.0.clone(), &e))?;
    let org = require_org(&req_id.0, &query.org)?;
    let runs = state
        .store
        .list_seo_runs(&org, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(req_id.0, runs)))
}
