use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Days, Utc};
use rust_decimal::Decimal;
use seoflow_content::UnconfiguredGenerator;
use seoflow_core::{
    AttributionStrategy, Caller, PipelineConfig, RollupKey, SeoRunKind, TopicStatus,
};
use seoflow_db::{MemoryStore, PipelineStore};
use seoflow_ingest::FeedRequest;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::*;
use crate::middleware::{AuthState, RateLimitState};

const KEYS: &str =
    "viewer-token:viewer,editor-token:content_editor,admin-token:admin,owner-token:owner";

fn state(store: Arc<MemoryStore>) -> AppState {
    state_with(store, &PipelineConfig::default())
}

fn state_with(store: Arc<MemoryStore>, pipeline: &PipelineConfig) -> AppState {
    let store: Arc<dyn PipelineStore> = store;
    AppState::new(
        store,
        pipeline,
        Arc::new(UnconfiguredGenerator),
        Timeouts::default(),
    )
}

fn app_with(store: Arc<MemoryStore>, rate_limit: RateLimitState) -> Router {
    let auth = AuthState::parse(KEYS, false).expect("auth");
    build_app(state(store), auth, rate_limit)
}

fn app(store: Arc<MemoryStore>) -> Router {
    app_with(store, default_rate_limit_state())
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = serde_json::from_slice(&bytes).expect("json parse");
    (status, json)
}

fn days_ago(days: u64) -> String {
    Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(days))
        .unwrap()
        .format("%Y-%m-%d")
        .to_string()
}

fn booking_rows() -> Value {
    let recent = days_ago(3);
    json!([
        ["trip_id", "total_amount", "base_rate", "city", "pickup_date"],
        ["T-1", "1200", "800", "Austin", recent],
        ["T-2", "900", "600", "Austin", recent],
        ["T-3", "400", "300", "Dallas", recent],
    ])
}

async fn import_bookings(app: &Router) -> Value {
    let (status, json) = send(
        app,
        "POST",
        "/api/v1/imports/bookings",
        Some("editor-token"),
        Some(json!({ "org": "acme", "source_label": "march", "rows": booking_rows() })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json
}

#[test]
fn normalize_limit_applies_defaults_and_bounds() {
    assert_eq!(normalize_limit(None), 50);
    assert_eq!(normalize_limit(Some(0)), 1);
    assert_eq!(normalize_limit(Some(1_000)), 200);
    assert_eq!(normalize_limit(Some(25)), 25);
}

#[test]
fn api_error_validation_error_maps_to_bad_request() {
    let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_is_public() {
    let app = app(Arc::new(MemoryStore::new()));
    let (status, json) = send(&app, "GET", "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "ok");
}

#[tokio::test]
async fn protected_routes_reject_missing_and_unknown_tokens() {
    let app = app(Arc::new(MemoryStore::new()));
    for token in [None, Some("nope")] {
        let (status, json) = send(&app, "GET", "/api/v1/topics?org=acme", token, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"]["code"], "unauthorized");
        assert!(json["meta"]["request_id"].as_str().is_some_and(|id| !id.is_empty()));
    }
}

#[tokio::test]
async fn request_id_is_echoed() {
    let app = app(Arc::new(MemoryStore::new()));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(
        response.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("req-42")
    );
}

#[tokio::test]
async fn roles_below_the_requirement_are_forbidden() {
    let app = app(Arc::new(MemoryStore::new()));
    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/metrics/compute",
        Some("viewer-token"),
        Some(json!({ "org": "acme", "from": "2026-03-01", "to": "2026-03-31" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["code"], "forbidden");

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/publish",
        Some("admin-token"),
        Some(json!({ "org": "acme" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn import_list_and_rollback_round_trip() {
    let store = Arc::new(MemoryStore::new());
    let app = app(store.clone());

    let imported = import_bookings(&app).await;
    assert_eq!(imported["data"]["imported"], 3);
    let import_id = imported["data"]["import_id"].as_str().unwrap().to_string();

    let (status, listed) = send(&app, "GET", "/api/v1/imports", Some("viewer-token"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);

    let rollback = format!("/api/v1/imports/{import_id}/rollback");
    let (status, _) = send(&app, "POST", &rollback, Some("editor-token"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, outcome) = send(&app, "POST", &rollback, Some("admin-token"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["data"]["deleted_count"], 3);

    let (status, again) = send(&app, "POST", &rollback, Some("admin-token"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(again["error"]["code"], "conflict");
}

#[tokio::test]
async fn feeds_without_required_columns_are_validation_errors() {
    let app = app(Arc::new(MemoryStore::new()));
    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/imports/ads",
        Some("editor-token"),
        Some(json!({
            "org": "acme",
            "source_label": "ads",
            "rows": [["campaign_id", "spend"], ["C1", "10"]],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
}

#[tokio::test]
async fn blank_org_is_rejected() {
    let app = app(Arc::new(MemoryStore::new()));
    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/topics/propose",
        Some("admin-token"),
        Some(json!({ "org": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "org is required");
}

#[tokio::test]
async fn proposals_are_listed_most_profitable_first() {
    let app = app(Arc::new(MemoryStore::new()));
    import_bookings(&app).await;

    let (status, proposed) = send(
        &app,
        "POST",
        "/api/v1/topics/propose",
        Some("admin-token"),
        Some(json!({ "org": "acme" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{proposed}");
    assert_eq!(proposed["data"]["proposed"][0]["segment_value"], "Austin");

    let (status, listed) = send(
        &app,
        "GET",
        "/api/v1/topics?org=acme&status=proposed",
        Some("viewer-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let topics = listed["data"].as_array().unwrap();
    assert_eq!(topics.len(), 2);
    assert_eq!(topics[0]["primary_keyword"], "Austin limo service");

    let (status, bad) = send(
        &app,
        "GET",
        "/api/v1/topics?org=acme&status=live",
        Some("viewer-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(bad["error"]["code"], "validation_error");
}

#[tokio::test]
async fn approving_a_proposal_without_a_draft_is_a_conflict() {
    let app = app(Arc::new(MemoryStore::new()));
    import_bookings(&app).await;
    let (_, proposed) = send(
        &app,
        "POST",
        "/api/v1/topics/propose",
        Some("admin-token"),
        Some(json!({ "org": "acme", "limit": 1 })),
    )
    .await;
    let topic_id = proposed["data"]["proposed"][0]["id"].as_str().unwrap().to_string();

    let (status, json) = send(
        &app,
        "POST",
        &format!("/api/v1/topics/{topic_id}/approve"),
        Some("admin-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"]["message"].as_str().unwrap().contains("no draft"));

    let (status, rejected) = send(
        &app,
        "POST",
        &format!("/api/v1/topics/{topic_id}/reject"),
        Some("admin-token"),
        Some(json!({ "reason": "off-brand" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["data"]["status"], "rejected");
}

#[tokio::test]
async fn unknown_topics_are_not_found() {
    let app = app(Arc::new(MemoryStore::new()));
    let (status, json) = send(
        &app,
        "POST",
        &format!("/api/v1/topics/{}/approve", uuid::Uuid::new_v4()),
        Some("admin-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");
}

#[tokio::test]
async fn generation_without_a_generator_is_an_internal_error() {
    let app = app(Arc::new(MemoryStore::new()));
    import_bookings(&app).await;
    let (_, proposed) = send(
        &app,
        "POST",
        "/api/v1/topics/propose",
        Some("admin-token"),
        Some(json!({ "org": "acme", "limit": 1 })),
    )
    .await;
    let topic_id = proposed["data"]["proposed"][0]["id"].as_str().unwrap().to_string();

    let (status, json) = send(
        &app,
        "POST",
        &format!("/api/v1/topics/{topic_id}/generate"),
        Some("admin-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["code"], "internal_error");
}

#[tokio::test]
async fn empty_pipeline_reports_frozen_and_holds_publishing() {
    let store = Arc::new(MemoryStore::new());
    let app = app(store.clone());

    let (status, freshness) =
        send(&app, "GET", "/api/v1/freshness?org=acme", Some("viewer-token"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(freshness["data"]["org"], "acme");
    assert_eq!(freshness["data"]["frozen"], true);
    assert_eq!(freshness["data"]["sources"].as_array().unwrap().len(), 3);

    let (status, outcome) = send(
        &app,
        "POST",
        "/api/v1/publish",
        Some("owner-token"),
        Some(json!({ "org": "acme" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["data"]["published"], 0);
    assert_eq!(outcome["data"]["held"]["reason"], "frozen");
    assert!(store.manifests().await.is_empty());

    let (status, runs) = send(
        &app,
        "GET",
        "/api/v1/runs?org=acme",
        Some("viewer-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(runs["data"][0]["status"], "held");
}

#[tokio::test]
async fn gate_run_over_an_empty_org_passes() {
    let app = app(Arc::new(MemoryStore::new()));
    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/gate/run",
        Some("admin-token"),
        Some(json!({ "org": "acme" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "passed");
    assert_eq!(json["data"]["evaluated"], 0);
}

#[tokio::test]
async fn rate_limit_applies_to_protected_routes_only() {
    let app = app_with(
        Arc::new(MemoryStore::new()),
        RateLimitState::new(1, Duration::from_secs(60)),
    );
    let (first, _) = send(&app, "GET", "/api/v1/imports", Some("viewer-token"), None).await;
    assert_eq!(first, StatusCode::OK);
    let (second, json) = send(&app, "GET", "/api/v1/imports", Some("viewer-token"), None).await;
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["error"]["code"], "rate_limited");

    let (health, _) = send(&app, "GET", "/api/v1/health", None, None).await;
    assert_eq!(health, StatusCode::OK);
}

#[tokio::test]
async fn development_mode_without_keys_acts_as_owner() {
    let auth = AuthState::parse("", true).expect("dev auth");
    let app = build_app(
        state(Arc::new(MemoryStore::new())),
        auth,
        default_rate_limit_state(),
    );
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/publish",
        None,
        Some(json!({ "org": "acme" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn scheduled_content_cycle_never_publishes() {
    let store = Arc::new(MemoryStore::new());
    let state = state(store.clone());
    let recent = days_ago(2);
    state
        .ingest
        .import_booking_feed(
            &Caller::system(),
            FeedRequest::new(
                "acme",
                "seed",
                vec![
                    vec![
                        "trip_id".to_string(),
                        "total_amount".to_string(),
                        "base_rate".to_string(),
                        "city".to_string(),
                        "pickup_date".to_string(),
                    ],
                    vec![
                        "T-1".to_string(),
                        "800".to_string(),
                        "500".to_string(),
                        "Austin".to_string(),
                        recent,
                    ],
                ],
            ),
        )
        .await
        .unwrap();

    crate::scheduler::run_content_cycle(&state).await;

    let topics = store.list_topics("acme", None).await.unwrap();
    assert_eq!(topics.len(), 1);
    assert!(topics.iter().all(|t| t.status != TopicStatus::Published));
    assert!(store.manifests().await.is_empty());
    let kinds: Vec<SeoRunKind> = store
        .list_seo_runs("acme", 10)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.kind)
        .collect();
    assert!(kinds.contains(&SeoRunKind::Propose));
    assert!(kinds.contains(&SeoRunKind::Gate));
    assert!(!kinds.contains(&SeoRunKind::Publish));
}

#[tokio::test]
async fn nightly_metrics_job_stores_rollups_for_each_org() {
    let store = Arc::new(MemoryStore::new());
    let state = state(store.clone());
    let pickup = days_ago(1);
    state
        .ingest
        .import_booking_feed(
            &Caller::system(),
            FeedRequest::new(
                "acme",
                "seed",
                vec![
                    vec![
                        "trip_id".to_string(),
                        "total_amount".to_string(),
                        "base_rate".to_string(),
                        "city".to_string(),
                        "pickup_date".to_string(),
                    ],
                    vec![
                        "T-1".to_string(),
                        "800".to_string(),
                        "500".to_string(),
                        "Austin".to_string(),
                        pickup,
                    ],
                ],
            ),
        )
        .await
        .unwrap();

    crate::scheduler::run_metrics_job(&state).await;

    let yesterday = Utc::now().date_naive().checked_sub_days(Days::new(1)).unwrap();
    let (from, to) = crate::scheduler::month_of(yesterday);
    let rollups = store.list_rollups("acme", from, to).await.unwrap();
    assert!(rollups
        .iter()
        .any(|r| matches!(r.key, RollupKey::Daily { date } if date == yesterday)));
}

#[tokio::test]
async fn freshness_is_reported_per_org() {
    let store = Arc::new(MemoryStore::new());
    let app = app(store.clone());
    import_bookings(&app).await;

    let (_, acme) =
        send(&app, "GET", "/api/v1/freshness?org=acme", Some("viewer-token"), None).await;
    let (_, beta) =
        send(&app, "GET", "/api/v1/freshness?org=beta", Some("viewer-token"), None).await;
    let status_of = |report: &Value, source: &str| {
        report["data"]["sources"]
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["source"] == source)
            .map(|s| s["status"].clone())
    };
    assert_eq!(status_of(&acme, "booking_feed"), Some(json!("fresh")));
    assert_eq!(status_of(&beta, "booking_feed"), Some(json!("missing")));

    let (status, _) =
        send(&app, "GET", "/api/v1/freshness?org=%20", Some("viewer-token"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn nightly_freshness_job_snapshots_each_org() {
    let store = Arc::new(MemoryStore::new());
    let app = app(store.clone());
    import_bookings(&app).await;

    crate::scheduler::run_freshness_job(&state(store.clone())).await;

    let snapshots = store.snapshots().await;
    assert_eq!(snapshots.len(), 3);
    assert!(snapshots.iter().all(|(org, _)| org == "acme"));
}

fn rows(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|r| r.iter().map(|c| (*c).to_string()).collect())
        .collect()
}

/// Ad spend charged to bookings across the daily rollups of the last week.
async fn attributed_spend(attribution: AttributionStrategy) -> Decimal {
    let store = Arc::new(MemoryStore::new());
    let mut pipeline = PipelineConfig::default();
    pipeline.metrics.attribution = attribution;
    let state = state_with(store.clone(), &pipeline);
    let day = days_ago(2);
    let caller = Caller::system();
    state
        .ingest
        .import_booking_feed(
            &caller,
            FeedRequest::new(
                "acme",
                "seed",
                rows(&[
                    &["trip_id", "total_amount", "base_rate", "city", "pickup_date"],
                    &["T-1", "800", "500", "Austin", day.as_str()],
                ]),
            ),
        )
        .await
        .unwrap();
    state
        .ingest
        .import_ad_spend_feed(
            &caller,
            FeedRequest::new(
                "acme",
                "ads",
                rows(&[&["campaign_id", "metric_date", "spend"], &["C1", day.as_str(), "120"]]),
            ),
        )
        .await
        .unwrap();

    let (from, to) = (
        Utc::now().date_naive().checked_sub_days(Days::new(7)).unwrap(),
        Utc::now().date_naive(),
    );
    state
        .metrics
        .compute_metrics(&caller, "acme", from, to)
        .await
        .unwrap();
    store
        .list_rollups("acme", from, to)
        .await
        .unwrap()
        .iter()
        .filter(|r| matches!(r.key, RollupKey::Daily { .. }))
        .map(|r| r.figures.ad_spend)
        .sum()
}

#[tokio::test]
async fn configured_attribution_strategy_reaches_the_metrics_engine() {
    assert_eq!(attributed_spend(AttributionStrategy::None).await, Decimal::ZERO);
    assert_eq!(
        attributed_spend(AttributionStrategy::RevenueShare).await,
        Decimal::new(120, 0)
    );
}
