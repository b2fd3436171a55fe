mod errors;
mod imports;
mod metrics;
mod pipeline;
mod topics;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use seoflow_content::{DraftGenerator, FreshnessMonitor, PublishScheduler, TopicManager};
use seoflow_core::{AppConfig, PipelineConfig};
use seoflow_db::PipelineStore;
use seoflow_ingest::IngestionEngine;
use seoflow_metrics::{attribution_for, MetricsEngine};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

pub(crate) use errors::{
    map_content_error, map_core_error, map_db_error, map_ingest_error, map_metrics_error,
};

/// Upper bounds for the two calls that leave the process.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub generator: Duration,
    pub attribution: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            generator: Duration::from_secs(120),
            attribution: Duration::from_secs(30),
        }
    }
}

impl Timeouts {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            generator: Duration::from_secs(config.generator_timeout_secs),
            attribution: Duration::from_secs(config.attribution_timeout_secs),
        }
    }
}

/// Every engine over one shared store. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PipelineStore>,
    pub ingest: IngestionEngine,
    pub metrics: MetricsEngine,
    pub topics: TopicManager,
    pub freshness: FreshnessMonitor,
    pub publisher: PublishScheduler,
}

impl AppState {
    #[must_use]
    pub fn new(
        store: Arc<dyn PipelineStore>,
        pipeline: &PipelineConfig,
        generator: Arc<dyn DraftGenerator>,
        timeouts: Timeouts,
    ) -> Self {
        let ingest = IngestionEngine::new(Arc::clone(&store), pipeline.ingest);
        let metrics = MetricsEngine::new(Arc::clone(&store), pipeline.margins.clone())
            .with_attribution(attribution_for(pipeline.metrics.attribution))
            .with_attribution_timeout(timeouts.attribution);
        let topics = TopicManager::new(
            Arc::clone(&store),
            metrics.clone(),
            pipeline.proposals.clone(),
            pipeline.gate.clone(),
        )
        .with_generator(generator)
        .with_generator_timeout(timeouts.generator);
        let freshness = FreshnessMonitor::new(Arc::clone(&store), &pipeline.freshness);
        let publisher =
            PublishScheduler::new(Arc::clone(&store), freshness.clone(), pipeline.cadence);
        Self {
            store,
            ingest,
            metrics,
            topics,
            freshness,
            publisher,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(crate) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(crate) fn new(request_id: String, data: T) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn require_org(req_id: &str, org: &str) -> Result<String, ApiError> {
    let org = org.trim();
    if org.is_empty() {
        return Err(ApiError::new(req_id, "validation_error", "org is required"));
    }
    Ok(org.to_string())
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/imports", get(imports::list_imports))
        .route("/api/v1/imports/bookings", post(imports::import_bookings))
        .route("/api/v1/imports/ads", post(imports::import_ads))
        .route(
            "/api/v1/imports/{import_id}/rollback",
            post(imports::rollback_import),
        )
        .route("/api/v1/metrics/compute", post(metrics::compute_metrics))
        .route("/api/v1/metrics/segments", get(metrics::list_segments))
        .route("/api/v1/topics", get(topics::list_topics))
        .route("/api/v1/topics/propose", post(topics::propose_topics))
        .route(
            "/api/v1/topics/{topic_id}/generate",
            post(topics::generate_draft),
        )
        .route(
            "/api/v1/topics/{topic_id}/approve",
            post(topics::approve_topic),
        )
        .route("/api/v1/topics/{topic_id}/reject", post(topics::reject_topic))
        .route("/api/v1/gate/run", post(pipeline::run_quality_gate))
        .route("/api/v1/publish", post(pipeline::publish))
        .route("/api/v1/freshness", get(pipeline::check_freshness))
        .route("/api/v1/runs", get(pipeline::list_runs))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}
