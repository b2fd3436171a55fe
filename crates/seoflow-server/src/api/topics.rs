use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use seoflow_content::{GenerationOutcome, ProposalSummary};
use seoflow_core::{Caller, Topic, TopicStatus};
use serde::Deserialize;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_content_error, map_core_error, require_org, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct ProposeRequest {
    pub org: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TopicsQuery {
    pub org: String,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RejectRequest {
    pub reason: String,
}

pub(super) async fn propose_topics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<ProposeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProposalSummary>>), ApiError> {
    let org = require_org(&req_id.0, &body.org)?;
    if body.limit == Some(0) {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "limit must be at least 1",
        ));
    }
    let summary = state
        .topics
        .propose(&caller, &org, body.limit)
        .await
        .map_err(|e| map_content_error(req_id.0.clone(), &e))?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(req_id.0, summary)),
    ))
}

pub(super) async fn list_topics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<TopicsQuery>,
) -> Result<Json<ApiResponse<Vec<Topic>>>, ApiError> {
    let org = require_org(&req_id.0, &query.org)?;
    let status = query
        .status
        .as_deref()
        .map(str::parse::<TopicStatus>)
        .transpose()
        .map_err(|e| map_core_error(req_id.0.clone(), &e))?;
    let topics = state
        .topics
        .list(&caller, &org, status)
        .await
        .map_err(|e| map_content_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(req_id.0, topics)))
}

pub(super) async fn generate_draft(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    Path(topic_id): Path<Uuid>,
) -> Result<Json<ApiResponse<GenerationOutcome>>, ApiError> {
    let outcome = state
        .topics
        .generate_draft(&caller, topic_id)
        .await
        .map_err(|e| map_content_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(req_id.0, outcome)))
}

pub(super) async fn approve_topic(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    Path(topic_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Topic>>, ApiError> {
    let topic = state
        .topics
        .approve(&caller, topic_id)
        .await
        .map_err(|e| map_content_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(req_id.0, topic)))
}

pub(super) async fn reject_topic(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    Path(topic_id): Path<Uuid>,
    Json(body): Json<RejectRequest>,
) -> Result<Json<ApiResponse<Topic>>, ApiError> {
    if body.reason.trim().is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "reason is required",
        ));
    }
    let topic = state
        .topics
        .reject(&caller, topic_id, &body.reason)
        .await
        .map_err(|e| map_content_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(req_id.0, topic)))
}
