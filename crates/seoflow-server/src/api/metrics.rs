use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use seoflow_core::{Caller, SegmentMetrics, SegmentType};
use seoflow_metrics::MetricsSummary;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_core_error, map_metrics_error, require_org, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct ComputeMetricsRequest {
    pub org: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub(super) struct SegmentsQuery {
    pub org: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Defaults to `city`.
    pub segment_type: Option<String>,
}

pub(super) async fn compute_metrics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<ComputeMetricsRequest>,
) -> Result<Json<ApiResponse<MetricsSummary>>, ApiError> {
    let org = require_org(&req_id.0, &body.org)?;
    let summary = state
        .metrics
        .compute_metrics(&caller, &org, body.from, body.to)
        .await
        .map_err(|e| map_metrics_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(req_id.0, summary)))
}

pub(super) async fn list_segments(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<SegmentsQuery>,
) -> Result<Json<ApiResponse<Vec<SegmentMetrics>>>, ApiError> {
    let org = require_org(&req_id.0, &query.org)?;
    let segment_type = match query.segment_type.as_deref() {
        None => SegmentType::City,
        Some(raw) => raw
            .parse::<SegmentType>()
            .map_err(|e| map_core_error(req_id.0.clone(), &e))?,
    };
    let segments = state
        .metrics
        .stored_segments(&caller, &org, query.from, query.to, segment_type)
        .await
        .map_err(|e| map_metrics_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(req_id.0, segments)))
}
