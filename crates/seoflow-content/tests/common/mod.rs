#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use seoflow_content::{
    DraftGenerator, DraftRequest, FreshnessMonitor, GeneratorError, PublishScheduler,
    TopicManager,
};
use seoflow_core::{
    AdMetricRecord, BookingRecord, CadencePolicy, CallToAction, Caller, CtaKind, Draft,
    DraftContent, DraftImage, FeedType, FreshnessConfig, FreshnessStatus, GateConfig,
    GateResult, ImageRole, ImportRun, IngestConfig, MarginTable, MetricsRollup, ProposalConfig,
    PublishManifest, PublishedPage, SegmentType, SeoRun, Topic, TopicStatus,
};
use seoflow_db::{
    BatchWrite, DbError, DuplicatePolicy, MemoryStore, PipelineStore, TopicTransition,
};
use seoflow_ingest::{FeedRequest, IngestionEngine};
use seoflow_metrics::{MetricsEngine, SegmentOpportunity};
use uuid::Uuid;

pub const ENTITIES: [&str; 7] = [
    "Austin-Bergstrom International Airport",
    "Sixth Street",
    "Zilker Park",
    "Moody Center",
    "South Congress",
    "Lady Bird Lake",
    "The Domain",
];

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub ingest: IngestionEngine,
    pub topics: TopicManager,
    pub scheduler: PublishScheduler,
}

pub fn gate_config() -> GateConfig {
    let entities: Vec<String> = ENTITIES.iter().map(|e| (*e).to_string()).collect();
    GateConfig {
        local_entities: BTreeMap::from([
            ("austin".to_string(), entities.clone()),
            ("dallas".to_string(), entities),
        ]),
        static_pages: vec!["/fleet".to_string(), "/quote".to_string()],
    }
}

pub fn harness(generator: Arc<dyn DraftGenerator>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let shared: Arc<dyn PipelineStore> = store.clone();
    let ingest = IngestionEngine::new(Arc::clone(&shared), IngestConfig::default());
    let metrics = MetricsEngine::new(Arc::clone(&shared), MarginTable::default());
    let topics = TopicManager::new(
        Arc::clone(&shared),
        metrics,
        ProposalConfig::default(),
        gate_config(),
    )
    .with_generator(generator);
    let freshness = FreshnessMonitor::new(Arc::clone(&shared), &FreshnessConfig::default());
    let scheduler = PublishScheduler::new(shared, freshness, CadencePolicy::default());
    Harness {
        store,
        ingest,
        topics,
        scheduler,
    }
}

pub fn opportunity(city: &str, score: f64) -> SegmentOpportunity {
    SegmentOpportunity {
        segment_type: SegmentType::City,
        segment_value: city.to_string(),
        profit: Decimal::new(100, 0),
        booking_count: 1,
        content_coverage: 0.0,
        score,
    }
}

fn days_ago(days: u64) -> String {
    Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(days))
        .unwrap()
        .format("%Y-%m-%d")
        .to_string()
}

/// Austin earns more than Dallas over the last week. Also refreshes both
/// import feeds.
pub async fn seed_recent_data(h: &Harness) {
    let header = ["trip_id", "total_amount", "base_rate", "city", "pickup_date"];
    let (three, two) = (days_ago(3), days_ago(2));
    let rows = [
        ["T-1", "1200", "800", "Austin", three.as_str()],
        ["T-2", "900", "600", "Austin", two.as_str()],
        ["T-3", "400", "300", "Dallas", two.as_str()],
    ];
    let mut feed = vec![header.iter().map(|c| (*c).to_string()).collect::<Vec<_>>()];
    feed.extend(rows.iter().map(|r| r.iter().map(|c| (*c).to_string()).collect()));
    h.ingest
        .import_booking_feed(&Caller::system(), FeedRequest::new("acme", "recent", feed))
        .await
        .unwrap();
    refresh_ads(h).await;
}

pub async fn refresh_ads(h: &Harness) {
    h.ingest
        .import_ad_spend_feed(
            &Caller::system(),
            FeedRequest::new(
                "acme",
                "ads",
                vec![
                    vec!["campaign_id".into(), "metric_date".into(), "spend".into()],
                    vec!["C1".into(), days_ago(1), "20".into()],
                ],
            ),
        )
        .await
        .unwrap();
}

pub fn page_body(city: &str) -> String {
    let mut body = format!(
        "Our {city} limo service covers airport runs, weddings and concerts. \
         Riders who book an {city} limo service get a flat quote before pickup.\n\n\
         ## Where we drive\n\n\
         Regular stops include Austin-Bergstrom International Airport, Sixth Street, \
         Zilker Park, the Moody Center, South Congress and Lady Bird Lake, with \
         shopping drops at The Domain. See the [fleet](/fleet) or ask for a [quote](/quote).\n\n"
    );
    for i in 1..=30 {
        body.push_str(&format!(
            "Trip note {i}: chauffeurs watch traffic on the way to each {city} venue, \
             confirm the pickup window by text, load luggage, keep water chilled, and \
             adjust the route when events close roads downtown. Groups can split \
             a larger coach, while couples usually prefer a sedan with quiet cabin \
             space and a driver who knows where to wait.\n\n"
        ));
    }
    body
}

pub fn passing_content(city: &str) -> DraftContent {
    DraftContent {
        body: page_body(city),
        meta_title: format!("{city} Limo Service | Airport Transfers and Nights Out"),
        meta_description: format!(
            "Book an {city} limo service for airport transfers, weddings and concerts. \
             Licensed chauffeurs, flat quotes, and late-night pickups across the city every day."
        ),
        h1: format!("{city} Limo Service"),
        internal_links: vec!["/fleet".to_string()],
        images: vec![
            image(ImageRole::Hero, "Black stretch limo parked downtown at dusk"),
            image(ImageRole::Gallery, "Leather rear cabin with ambient lighting"),
            image(ImageRole::Inline, "Chauffeur loading luggage at the airport curb"),
        ],
        ctas: vec![
            CallToAction {
                kind: CtaKind::Primary,
                label: "Get a quote".to_string(),
                href: "/quote".to_string(),
                above_fold: true,
            },
            CallToAction {
                kind: CtaKind::Phone,
                label: "Call dispatch".to_string(),
                href: "tel:+1-512-555-0100".to_string(),
                above_fold: true,
            },
        ],
    }
}

fn image(role: ImageRole, alt: &str) -> DraftImage {
    DraftImage {
        url: format!("https://cdn.example.com/{}.jpg", alt.len()),
        alt: Some(alt.to_string()),
        role,
    }
}

/// Writes a gate-passing page for whatever city the request targets.
pub struct PassingGenerator;

#[async_trait]
impl DraftGenerator for PassingGenerator {
    fn name(&self) -> &'static str {
        "passing"
    }

    async fn generate(&self, request: &DraftRequest) -> Result<DraftContent, GeneratorError> {
        let city = request
            .primary_keyword
            .split_whitespace()
            .next()
            .unwrap_or("Austin")
            .to_string();
        Ok(passing_content(&city))
    }
}

/// Writes a page with no hero image.
pub struct HerolessGenerator;

#[async_trait]
impl DraftGenerator for HerolessGenerator {
    fn name(&self) -> &'static str {
        "heroless"
    }

    async fn generate(&self, _request: &DraftRequest) -> Result<DraftContent, GeneratorError> {
        let mut content = passing_content("Austin");
        content.images.retain(|img| img.role != ImageRole::Hero);
        Ok(content)
    }
}

/// Delegates to a [`MemoryStore`] but fails every Ready to Published
/// transition after the first `publish_budget` succeed.
pub struct FaultyStore {
    pub inner: Arc<MemoryStore>,
    pub publish_budget: usize,
    publishes: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryStore>, publish_budget: usize) -> Self {
        Self {
            inner,
            publish_budget,
            publishes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PipelineStore for FaultyStore {
    async fn create_import_run(&self, run: &ImportRun) -> Result<(), DbError> {
        self.inner.create_import_run(run).await
    }
    async fn finish_import_run(&self, run: &ImportRun) -> Result<(), DbError> {
        self.inner.finish_import_run(run).await
    }
    async fn get_import_run(&self, id: Uuid) -> Result<Option<ImportRun>, DbError> {
        self.inner.get_import_run(id).await
    }
    async fn list_import_runs(&self, limit: i64) -> Result<Vec<ImportRun>, DbError> {
        self.inner.list_import_runs(limit).await
    }
    async fn mark_import_rolled_back(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), DbError> {
        self.inner.mark_import_rolled_back(id, at).await
    }
    async fn latest_settled_import_at(
        &self,
        org: &str,
        feed_type: FeedType,
    ) -> Result<Option<DateTime<Utc>>, DbError> {
        self.inner.latest_settled_import_at(org, feed_type).await
    }
    async fn list_import_orgs(&self) -> Result<Vec<String>, DbError> {
        self.inner.list_import_orgs().await
    }
    async fn write_bookings(
        &self,
        rows: &[BookingRecord],
        policy: DuplicatePolicy,
    ) -> Result<BatchWrite, DbError> {
        self.inner.write_bookings(rows, policy).await
    }
    async fn upsert_ad_metrics(&self, rows: &[AdMetricRecord]) -> Result<BatchWrite, DbError> {
        self.inner.upsert_ad_metrics(rows).await
    }
    async fn delete_records_for_import(&self, run_id: Uuid) -> Result<u64, DbError> {
        self.inner.delete_records_for_import(run_id).await
    }
    async fn list_settled_bookings(
        &self,
        org: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<BookingRecord>, DbError> {
        self.inner.list_settled_bookings(org, from, to).await
    }
    async fn list_settled_ad_metrics(
        &self,
        org: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AdMetricRecord>, DbError> {
        self.inner.list_settled_ad_metrics(org, from, to).await
    }
    async fn replace_rollups(
        &self,
        org: &str,
        from: NaiveDate,
        to: NaiveDate,
        rollups: &[MetricsRollup],
    ) -> Result<(), DbError> {
        self.inner.replace_rollups(org, from, to, rollups).await
    }
    async fn list_rollups(
        &self,
        org: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<MetricsRollup>, DbError> {
        self.inner.list_rollups(org, from, to).await
    }
    async fn insert_topic(&self, topic: &Topic) -> Result<bool, DbError> {
        self.inner.insert_topic(topic).await
    }
    async fn get_topic(&self, id: Uuid) -> Result<Option<Topic>, DbError> {
        self.inner.get_topic(id).await
    }
    async fn list_topics(
        &self,
        org: &str,
        status: Option<TopicStatus>,
    ) -> Result<Vec<Topic>, DbError> {
        self.inner.list_topics(org, status).await
    }
    async fn transition_topic(&self, change: &TopicTransition) -> Result<Topic, DbError> {
        if change.to == TopicStatus::Published
            && self.publishes.fetch_add(1, Ordering::SeqCst) >= self.publish_budget
        {
            return Err(DbError::Decode {
                entity: "topic",
                reason: "connection reset".to_string(),
            });
        }
        self.inner.transition_topic(change).await
    }
    async fn latest_topic_created_at(
        &self,
        org: &str,
    ) -> Result<Option<DateTime<Utc>>, DbError> {
        self.inner.latest_topic_created_at(org).await
    }
    async fn list_published_pages(&self, org: &str) -> Result<Vec<PublishedPage>, DbError> {
        self.inner.list_published_pages(org).await
    }
    async fn put_draft(&self, draft: &Draft) -> Result<(), DbError> {
        self.inner.put_draft(draft).await
    }
    async fn get_draft(&self, topic_id: Uuid) -> Result<Option<Draft>, DbError> {
        self.inner.get_draft(topic_id).await
    }
    async fn append_gate_result(&self, result: &GateResult) -> Result<(), DbError> {
        self.inner.append_gate_result(result).await
    }
    async fn latest_gate_result(&self, topic_id: Uuid) -> Result<Option<GateResult>, DbError> {
        self.inner.latest_gate_result(topic_id).await
    }
    async fn insert_manifest(&self, manifest: &PublishManifest) -> Result<(), DbError> {
        self.inner.insert_manifest(manifest).await
    }
    async fn latest_manifest(&self, org: &str) -> Result<Option<PublishManifest>, DbError> {
        self.inner.latest_manifest(org).await
    }
    async fn insert_seo_run(&self, run: &SeoRun) -> Result<(), DbError> {
        self.inner.insert_seo_run(run).await
    }
    async fn list_seo_runs(&self, org: &str, limit: i64) -> Result<Vec<SeoRun>, DbError> {
        self.inner.list_seo_runs(org, limit).await
    }
    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<bool, DbError> {
        self.inner.try_acquire_lease(name, holder, ttl).await
    }
    async fn release_lease(&self, name: &str, holder: &str) -> Result<(), DbError> {
        self.inner.release_lease(name, holder).await
    }
    async fn insert_freshness_snapshot(
        &self,
        org: &str,
        statuses: &[FreshnessStatus],
    ) -> Result<(), DbError> {
        self.inner.insert_freshness_snapshot(org, statuses).await
    }
}
