//! Live tests for `PgStore` using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database. The
//! `migrations` path is relative to `crates/seoflow-db/`.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use seoflow_core::{
    normalize_keyword, AdMetricRecord, BookingRecord, Draft, DraftContent, FeedType, GateResult,
    GateStatus, ImportRun, ImportStatus, MetricsRollup, PageType, ProfitFigures, PublishManifest,
    RollupKey, SegmentType, Topic, TopicStatus,
};
use seoflow_db::{DbError, DuplicatePolicy, PgStore, PipelineStore, TopicTransition};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn settled_run(store: &PgStore, feed_type: FeedType) -> ImportRun {
    let mut run = ImportRun {
        id: Uuid::new_v4(),
        org: "acme".to_string(),
        feed_type,
        source_label: "live.csv".to_string(),
        status: ImportStatus::Processing,
        total_rows: 0,
        imported_count: 0,
        updated_count: 0,
        skipped_count: 0,
        error_count: 0,
        warning_count: 0,
        error_samples: vec![],
        warning_samples: vec![],
        created_by: Some("tester".to_string()),
        started_at: Utc::now(),
        completed_at: None,
        rolled_back_at: None,
    };
    store
        .create_import_run(&run)
        .await
        .expect("create_import_run failed");
    run.status = ImportStatus::Completed;
    run.completed_at = Some(Utc::now());
    store
        .finish_import_run(&run)
        .await
        .expect("finish_import_run failed");
    run
}

fn booking(trip_id: &str, run_id: Uuid, total: i64) -> BookingRecord {
    BookingRecord {
        trip_id: trip_id.to_string(),
        org: "acme".to_string(),
        total_amount: Decimal::new(total, 0),
        base_rate: Decimal::new(total * 8 / 10, 0),
        tax_amount: Decimal::ZERO,
        driver_payout: Decimal::ZERO,
        service_type: "airport".to_string(),
        vehicle_type: "sedan".to_string(),
        booking_type: "one_way".to_string(),
        city: "Austin".to_string(),
        pickup_date: Some(date(2026, 3, 2)),
        import_run_id: run_id,
    }
}

fn ad(campaign: &str, run_id: Uuid, spend: i64) -> AdMetricRecord {
    AdMetricRecord {
        campaign_id: campaign.to_string(),
        metric_date: date(2026, 3, 2),
        org: "acme".to_string(),
        campaign_name: Some("Spring".to_string()),
        impressions: 1000,
        clicks: 50,
        spend: Decimal::new(spend, 0),
        conversions: 2,
        revenue: Decimal::new(400, 0),
        ctr: 0.05,
        roi: 1.0,
        import_run_id: run_id,
    }
}

fn topic(keyword: &str) -> Topic {
    let now = Utc::now();
    Topic {
        id: Uuid::new_v4(),
        org: "acme".to_string(),
        title: keyword.to_string(),
        slug: keyword.replace(' ', "-"),
        page_type: PageType::City,
        site_slug: "main".to_string(),
        primary_keyword: keyword.to_string(),
        normalized_keyword: normalize_keyword(keyword),
        secondary_keywords: vec!["airport".to_string()],
        target_url: format!("/{}", keyword.replace(' ', "-")),
        status: TopicStatus::Proposed,
        profit_score: 70.0,
        estimated_traffic: 100,
        difficulty: 40.0,
        segment_type: Some(SegmentType::City),
        segment_value: Some("Austin".to_string()),
        approved_by: None,
        approved_at: None,
        rejection_reason: None,
        published_at: None,
        created_at: now,
        updated_at: now,
    }
}

// ---------------------------------------------------------------------------
// Imports and records
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn booking_skip_policy_is_idempotent(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let run = settled_run(&store, FeedType::Booking).await;
    let rows = vec![booking("T1", run.id, 100), booking("T2", run.id, 200)];

    let first = store
        .write_bookings(&rows, DuplicatePolicy::Skip)
        .await
        .unwrap();
    let second = store
        .write_bookings(&rows, DuplicatePolicy::Skip)
        .await
        .unwrap();

    assert_eq!(first.inserted, 2);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn booking_overwrite_reports_updates(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let run = settled_run(&store, FeedType::Booking).await;
    store
        .write_bookings(&[booking("T1", run.id, 100)], DuplicatePolicy::Skip)
        .await
        .unwrap();

    let outcome = store
        .write_bookings(&[booking("T1", run.id, 150)], DuplicatePolicy::Overwrite)
        .await
        .unwrap();
    assert_eq!(outcome.updated, 1);

    let rows = store
        .list_settled_bookings("acme", date(2026, 3, 1), date(2026, 3, 31))
        .await
        .unwrap();
    assert_eq!(rows[0].total_amount, Decimal::new(150, 0));
}

#[sqlx::test(migrations = "../../migrations")]
async fn ad_metrics_merge_last_write_wins(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let first_run = settled_run(&store, FeedType::AdSpend).await;
    let second_run = settled_run(&store, FeedType::AdSpend).await;

    store
        .upsert_ad_metrics(&[ad("C1", first_run.id, 40)])
        .await
        .unwrap();
    let merged = store
        .upsert_ad_metrics(&[ad("C1", second_run.id, 55)])
        .await
        .unwrap();
    assert_eq!(merged.updated, 1);

    let rows = store
        .list_settled_ad_metrics("acme", date(2026, 3, 1), date(2026, 3, 31))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].spend, Decimal::new(55, 0));
    assert_eq!(rows[0].import_run_id, second_run.id);
}

#[sqlx::test(migrations = "../../migrations")]
async fn delete_for_import_only_touches_owned_rows(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let keep = settled_run(&store, FeedType::Booking).await;
    let drop = settled_run(&store, FeedType::Booking).await;
    store
        .write_bookings(&[booking("K1", keep.id, 100)], DuplicatePolicy::Skip)
        .await
        .unwrap();
    store
        .write_bookings(
            &[booking("D1", drop.id, 100), booking("D2", drop.id, 100)],
            DuplicatePolicy::Skip,
        )
        .await
        .unwrap();

    let deleted = store.delete_records_for_import(drop.id).await.unwrap();
    assert_eq!(deleted, 2);

    let remaining = store
        .list_settled_bookings("acme", date(2026, 3, 1), date(2026, 3, 31))
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].trip_id, "K1");
}

#[sqlx::test(migrations = "../../migrations")]
async fn rolled_back_run_rejects_second_rollback(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let run = settled_run(&store, FeedType::Booking).await;

    store.mark_import_rolled_back(run.id, Utc::now()).await.unwrap();
    let err = store
        .mark_import_rolled_back(run.id, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidTransition { .. }));

    let stored = store.get_import_run(run.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ImportStatus::RolledBack);
    assert!(stored.rolled_back_at.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn latest_settled_import_ignores_processing_runs(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    assert!(store
        .latest_settled_import_at("acme", FeedType::Booking)
        .await
        .unwrap()
        .is_none());

    let run = settled_run(&store, FeedType::Booking).await;
    let latest = store
        .latest_settled_import_at("acme", FeedType::Booking)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        latest.timestamp_millis() / 1000,
        run.completed_at.unwrap().timestamp_millis() / 1000
    );
    assert!(store
        .latest_settled_import_at("acme", FeedType::AdSpend)
        .await
        .unwrap()
        .is_none());
    assert!(store
        .latest_settled_import_at("beta", FeedType::Booking)
        .await
        .unwrap()
        .is_none());
}

// ---------------------------------------------------------------------------
// Rollups
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn replace_rollups_swaps_the_whole_set(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let from = date(2026, 3, 1);
    let to = date(2026, 3, 31);
    let rollup = |key: RollupKey| MetricsRollup {
        org: "acme".to_string(),
        period_start: from,
        period_end: to,
        key,
        figures: ProfitFigures::default(),
    };

    store
        .replace_rollups(
            "acme",
            from,
            to,
            &[
                rollup(RollupKey::Daily { date: from }),
                rollup(RollupKey::Daily { date: to }),
            ],
        )
        .await
        .unwrap();
    store
        .replace_rollups(
            "acme",
            from,
            to,
            &[rollup(RollupKey::Segment {
                segment_type: SegmentType::City,
                segment_value: "Austin".to_string(),
            })],
        )
        .await
        .unwrap();

    let stored = store.list_rollups("acme", from, to).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(matches!(stored[0].key, RollupKey::Segment { .. }));
}

// ---------------------------------------------------------------------------
// Topics, drafts, gate history
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn keyword_uniqueness_is_enforced_per_org(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    assert!(store.insert_topic(&topic("Austin Limo")).await.unwrap());
    assert!(!store.insert_topic(&topic("austin   limo")).await.unwrap());

    let mut other_org = topic("Austin Limo");
    other_org.org = "globex".to_string();
    assert!(store.insert_topic(&other_org).await.unwrap());
}

#[sqlx::test(migrations = "../../migrations")]
async fn topic_transition_is_compare_and_set(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let t = topic("dallas limo");
    store.insert_topic(&t).await.unwrap();

    let at = Utc::now();
    let ready = store
        .transition_topic(
            &TopicTransition::new(t.id, TopicStatus::Proposed, TopicStatus::Ready, at)
                .approved_by("admin-1"),
        )
        .await
        .unwrap();
    assert_eq!(ready.status, TopicStatus::Ready);
    assert_eq!(ready.approved_by.as_deref(), Some("admin-1"));
    assert!(ready.approved_at.is_some());

    let err = store
        .transition_topic(&TopicTransition::new(
            t.id,
            TopicStatus::Proposed,
            TopicStatus::Rejected,
            at,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidTransition { .. }));

    let missing = store
        .transition_topic(&TopicTransition::new(
            Uuid::new_v4(),
            TopicStatus::Proposed,
            TopicStatus::Draft,
            at,
        ))
        .await
        .unwrap_err();
    assert!(matches!(missing, DbError::NotFound { .. }));
}

#[sqlx::test(migrations = "../../migrations")]
async fn latest_gate_result_follows_current_draft(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let t = topic("austin prom limo");
    store.insert_topic(&t).await.unwrap();

    let content = DraftContent {
        body: "# Austin prom limo\n\nBody".to_string(),
        meta_title: "Austin prom limo".to_string(),
        meta_description: "Prom night".to_string(),
        h1: "Austin prom limo".to_string(),
        internal_links: vec![],
        images: vec![],
        ctas: vec![],
    };
    let draft = Draft {
        id: Uuid::new_v4(),
        topic_id: t.id,
        content,
        word_count: 4,
        generated_at: Utc::now(),
    };
    store.put_draft(&draft).await.unwrap();

    for status in [GateStatus::Failed, GateStatus::Warned] {
        store
            .append_gate_result(&GateResult {
                id: Uuid::new_v4(),
                topic_id: t.id,
                draft_id: draft.id,
                categories: vec![],
                overall_status: status,
                suggestions: vec![],
                evaluated_at: Utc::now(),
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let latest = store.latest_gate_result(t.id).await.unwrap().unwrap();
    assert_eq!(latest.overall_status, GateStatus::Warned);

    let regenerated = Draft {
        id: Uuid::new_v4(),
        ..draft
    };
    store.put_draft(&regenerated).await.unwrap();
    assert!(store.latest_gate_result(t.id).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Manifests and leases
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn manifests_are_append_only(pool: sqlx::PgPool) {
    let store = PgStore::new(pool.clone());
    let manifest = PublishManifest {
        id: Uuid::new_v4(),
        org: "acme".to_string(),
        published_at: Utc::now(),
        topic_ids: vec![Uuid::new_v4()],
        published_count: 1,
        candidate_count: 1,
        skipped: vec![],
        published_by: "owner".to_string(),
    };
    store.insert_manifest(&manifest).await.unwrap();

    let update = sqlx::query("UPDATE seo_publish_manifests SET published_count = 0")
        .execute(&pool)
        .await;
    assert!(update.is_err());

    let latest = store.latest_manifest("acme").await.unwrap().unwrap();
    assert_eq!(latest.id, manifest.id);
}

#[sqlx::test(migrations = "../../migrations")]
async fn lease_blocks_second_holder(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let ttl = Duration::from_secs(60);

    assert!(store.try_acquire_lease("pipeline", "a", ttl).await.unwrap());
    assert!(!store.try_acquire_lease("pipeline", "b", ttl).await.unwrap());
    store.release_lease("pipeline", "a").await.unwrap();
    assert!(store.try_acquire_lease("pipeline", "b", ttl).await.unwrap());
}
