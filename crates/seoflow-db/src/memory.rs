//! In-process [`PipelineStore`] used by tests and local dry runs.
//!
//! All state sits behind one mutex, so every trait call is atomic with
//! respect to every other call on the same store.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use seoflow_core::{
    AdMetricRecord, BookingRecord, Draft, FeedType, FreshnessStatus, GateResult, ImportRun,
    ImportStatus, MetricsRollup, PublishManifest, PublishedPage, SeoRun, Topic, TopicStatus,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::store::{BatchWrite, DuplicatePolicy, PipelineStore, TopicTransition};
use crate::DbError;

struct Lease {
    holder: String,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    imports: HashMap<Uuid, ImportRun>,
    bookings: HashMap<String, BookingRecord>,
    ads: HashMap<(String, NaiveDate), AdMetricRecord>,
    rollups: BTreeMap<(String, NaiveDate, NaiveDate), Vec<MetricsRollup>>,
    topics: HashMap<Uuid, Topic>,
    drafts: HashMap<Uuid, Draft>,
    gate_results: Vec<GateResult>,
    manifests: Vec<PublishManifest>,
    seo_runs: Vec<SeoRun>,
    leases: HashMap<String, Lease>,
    snapshots: Vec<(String, FreshnessStatus)>,
}

impl State {
    fn is_settled(&self, run_id: Uuid) -> bool {
        self.imports
            .get(&run_id)
            .is_some_and(|run| run.status.is_settled())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Freshness snapshots recorded so far with their org, oldest first.
    pub async fn snapshots(&self) -> Vec<(String, FreshnessStatus)> {
        self.state.lock().await.snapshots.clone()
    }

    /// Number of stored gate evaluations for a topic across all its drafts.
    pub async fn gate_history_len(&self, topic_id: Uuid) -> usize {
        self.state
            .lock()
            .await
            .gate_results
            .iter()
            .filter(|r| r.topic_id == topic_id)
            .count()
    }

    /// Every manifest ever written, oldest first.
    pub async fn manifests(&self) -> Vec<PublishManifest> {
        self.state.lock().await.manifests.clone()
    }
}

fn apply_transition(topic: &mut Topic, change: &TopicTransition) {
    topic.status = change.to;
    topic.updated_at = change.at;
    match change.to {
        TopicStatus::Ready => {
            if let Some(approver) = &change.approved_by {
                topic.approved_by = Some(approver.clone());
                topic.approved_at = Some(change.at);
            }
        }
        TopicStatus::Published => topic.published_at = Some(change.at),
        TopicStatus::Rejected => topic.rejection_reason.clone_from(&change.rejection_reason),
        TopicStatus::Proposed | TopicStatus::Draft | TopicStatus::Blocked => {}
    }
}

fn newest_first<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> DateTime<Utc>,
{
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
}

fn limit_to_usize(limit: i64) -> usize {
    usize::try_from(limit.max(0)).unwrap_or(usize::MAX)
}

#[async_trait]
impl PipelineStore for MemoryStore {
    async fn create_import_run(&self, run: &ImportRun) -> Result<(), DbError> {
        self.state.lock().await.imports.insert(run.id, run.clone());
        Ok(())
    }

    async fn finish_import_run(&self, run: &ImportRun) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        let stored = state
            .imports
            .get_mut(&run.id)
            .ok_or_else(|| DbError::not_found("import run", run.id))?;
        if stored.status != ImportStatus::Processing {
            return Err(DbError::InvalidTransition {
                entity: "import run",
                id: run.id.to_string(),
                expected: ImportStatus::Processing.to_string(),
            });
        }
        *stored = run.clone();
        Ok(())
    }

    async fn get_import_run(&self, id: Uuid) -> Result<Option<ImportRun>, DbError> {
        Ok(self.state.lock().await.imports.get(&id).cloned())
    }

    async fn list_import_runs(&self, limit: i64) -> Result<Vec<ImportRun>, DbError> {
        let state = self.state.lock().await;
        let mut runs: Vec<ImportRun> = state.imports.values().cloned().collect();
        newest_first(&mut runs, |r| r.started_at);
        runs.truncate(limit_to_usize(limit));
        Ok(runs)
    }

    async fn mark_import_rolled_back(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        let stored = state
            .imports
            .get_mut(&id)
            .ok_or_else(|| DbError::not_found("import run", id))?;
        if !stored.status.is_settled() {
            return Err(DbError::InvalidTransition {
                entity: "import run",
                id: id.to_string(),
                expected: "completed or completed_with_errors".to_string(),
            });
        }
        stored.status = ImportStatus::RolledBack;
        stored.rolled_back_at = Some(at);
        Ok(())
    }

    async fn latest_settled_import_at(
        &self,
        org: &str,
        feed_type: FeedType,
    ) -> Result<Option<DateTime<Utc>>, DbError> {
        let state = self.state.lock().await;
        Ok(state
            .imports
            .values()
            .filter(|r| r.org == org && r.feed_type == feed_type && r.status.is_settled())
            .filter_map(|r| r.completed_at)
            .max())
    }

    async fn list_import_orgs(&self) -> Result<Vec<String>, DbError> {
        let state = self.state.lock().await;
        let mut orgs: Vec<String> = state
            .imports
            .values()
            .filter(|r| r.status.is_settled())
            .map(|r| r.org.clone())
            .collect();
        orgs.sort();
        orgs.dedup();
        Ok(orgs)
    }

    async fn write_bookings(
        &self,
        rows: &[BookingRecord],
        policy: DuplicatePolicy,
    ) -> Result<BatchWrite, DbError> {
        let mut state = self.state.lock().await;
        let mut outcome = BatchWrite::default();
        for row in rows {
            match (state.bookings.contains_key(&row.trip_id), policy) {
                (false, _) => {
                    state.bookings.insert(row.trip_id.clone(), row.clone());
                    outcome.inserted += 1;
                }
                (true, DuplicatePolicy::Overwrite) => {
                    state.bookings.insert(row.trip_id.clone(), row.clone());
                    outcome.updated += 1;
                }
                (true, DuplicatePolicy::Skip) => outcome.skipped += 1,
            }
        }
        Ok(outcome)
    }

    async fn upsert_ad_metrics(&self, rows: &[AdMetricRecord]) -> Result<BatchWrite, DbError> {
        let mut state = self.state.lock().await;
        let mut outcome = BatchWrite::default();
        for row in rows {
            let key = (row.campaign_id.clone(), row.metric_date);
            if state.ads.insert(key, row.clone()).is_some() {
                outcome.updated += 1;
            } else {
                outcome.inserted += 1;
            }
        }
        Ok(outcome)
    }

    async fn delete_records_for_import(&self, run_id: Uuid) -> Result<u64, DbError> {
        let mut state = self.state.lock().await;
        let before = state.bookings.len() + state.ads.len();
        state.bookings.retain(|_, b| b.import_run_id != run_id);
        state.ads.retain(|_, a| a.import_run_id != run_id);
        let after = state.bookings.len() + state.ads.len();
        Ok(u64::try_from(before - after).unwrap_or(u64::MAX))
    }

    async fn list_settled_bookings(
        &self,
        org: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<BookingRecord>, DbError> {
        let state = self.state.lock().await;
        let mut rows: Vec<BookingRecord> = state
            .bookings
            .values()
            .filter(|b| b.org == org)
            .filter(|b| b.pickup_date.is_some_and(|d| d >= from && d <= to))
            .filter(|b| state.is_settled(b.import_run_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.trip_id.cmp(&b.trip_id));
        Ok(rows)
    }

    async fn list_settled_ad_metrics(
        &self,
        org: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AdMetricRecord>, DbError> {
        let state = self.state.lock().await;
        let mut rows: Vec<AdMetricRecord> = state
            .ads
            .values()
            .filter(|a| a.org == org && a.metric_date >= from && a.metric_date <= to)
            .filter(|a| state.is_settled(a.import_run_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.metric_date, &a.campaign_id).cmp(&(b.metric_date, &b.campaign_id))
        });
        Ok(rows)
    }

    async fn replace_rollups(
        &self,
        org: &str,
        from: NaiveDate,
        to: NaiveDate,
        rollups: &[MetricsRollup],
    ) -> Result<(), DbError> {
        self.state
            .lock()
            .await
            .rollups
            .insert((org.to_string(), from, to), rollups.to_vec());
        Ok(())
    }

    async fn list_rollups(
        &self,
        org: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<MetricsRollup>, DbError> {
        Ok(self
            .state
            .lock()
            .await
            .rollups
            .get(&(org.to_string(), from, to))
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_topic(&self, topic: &Topic) -> Result<bool, DbError> {
        let mut state = self.state.lock().await;
        let taken = state
            .topics
            .values()
            .any(|t| t.org == topic.org && t.normalized_keyword == topic.normalized_keyword);
        if taken {
            return Ok(false);
        }
        state.topics.insert(topic.id, topic.clone());
        Ok(true)
    }

    async fn get_topic(&self, id: Uuid) -> Result<Option<Topic>, DbError> {
        Ok(self.state.lock().await.topics.get(&id).cloned())
    }

    async fn list_topics(
        &self,
        org: &str,
        status: Option<TopicStatus>,
    ) -> Result<Vec<Topic>, DbError> {
        let state = self.state.lock().await;
        let mut topics: Vec<Topic> = state
            .topics
            .values()
            .filter(|t| t.org == org && status.is_none_or(|s| t.status == s))
            .cloned()
            .collect();
        topics.sort_by(|a, b| {
            b.profit_score
                .total_cmp(&a.profit_score)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(topics)
    }

    async fn transition_topic(&self, change: &TopicTransition) -> Result<Topic, DbError> {
        let mut state = self.state.lock().await;
        let topic = state
            .topics
            .get_mut(&change.topic_id)
            .ok_or_else(|| DbError::not_found("topic", change.topic_id))?;
        if topic.status != change.from {
            return Err(DbError::InvalidTransition {
                entity: "topic",
                id: change.topic_id.to_string(),
                expected: change.from.to_string(),
            });
        }
        apply_transition(topic, change);
        Ok(topic.clone())
    }

    async fn latest_topic_created_at(
        &self,
        org: &str,
    ) -> Result<Option<DateTime<Utc>>, DbError> {
        let state = self.state.lock().await;
        Ok(state
            .topics
            .values()
            .filter(|t| t.org == org)
            .map(|t| t.created_at)
            .max())
    }

    async fn list_published_pages(&self, org: &str) -> Result<Vec<PublishedPage>, DbError> {
        let state = self.state.lock().await;
        Ok(state
            .topics
            .values()
            .filter(|t| t.org == org && t.status == TopicStatus::Published)
            .map(|t| PublishedPage {
                topic_id: t.id,
                page_type: t.page_type,
                target_url: t.target_url.clone(),
                segment_value: t.segment_value.clone(),
                body: state
                    .drafts
                    .get(&t.id)
                    .map(|d| d.content.body.clone())
                    .unwrap_or_default(),
            })
            .collect())
    }

    async fn put_draft(&self, draft: &Draft) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        if !state.topics.contains_key(&draft.topic_id) {
            return Err(DbError::not_found("topic", draft.topic_id));
        }
        state.drafts.insert(draft.topic_id, draft.clone());
        Ok(())
    }

    async fn get_draft(&self, topic_id: Uuid) -> Result<Option<Draft>, DbError> {
        Ok(self.state.lock().await.drafts.get(&topic_id).cloned())
    }

    async fn append_gate_result(&self, result: &GateResult) -> Result<(), DbError> {
        self.state.lock().await.gate_results.push(result.clone());
        Ok(())
    }

    async fn latest_gate_result(&self, topic_id: Uuid) -> Result<Option<GateResult>, DbError> {
        let state = self.state.lock().await;
        let Some(draft) = state.drafts.get(&topic_id) else {
            return Ok(None);
        };
        // Later appends win ties on evaluated_at.
        Ok(state
            .gate_results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.draft_id == draft.id)
            .max_by_key(|(idx, r)| (r.evaluated_at, *idx))
            .map(|(_, r)| r.clone()))
    }

    async fn insert_manifest(&self, manifest: &PublishManifest) -> Result<(), DbError> {
        self.state.lock().await.manifests.push(manifest.clone());
        Ok(())
    }

    async fn latest_manifest(&self, org: &str) -> Result<Option<PublishManifest>, DbError> {
        let state = self.state.lock().await;
        Ok(state
            .manifests
            .iter()
            .filter(|m| m.org == org)
            .max_by_key(|m| m.published_at)
            .cloned())
    }

    async fn insert_seo_run(&self, run: &SeoRun) -> Result<(), DbError> {
        self.state.lock().await.seo_runs.push(run.clone());
        Ok(())
    }

    async fn list_seo_runs(&self, org: &str, limit: i64) -> Result<Vec<SeoRun>, DbError> {
        let state = self.state.lock().await;
        let mut runs: Vec<SeoRun> = state
            .seo_runs
            .iter()
            .filter(|r| r.org == org)
            .cloned()
            .collect();
        newest_first(&mut runs, |r| r.started_at);
        runs.truncate(limit_to_usize(limit));
        Ok(runs)
    }

    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<bool, DbError> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| DbError::decode("lease", e))?;
        let mut state = self.state.lock().await;
        if let Some(existing) = state.leases.get(name) {
            if existing.expires_at > now && existing.holder != holder {
                return Ok(false);
            }
        }
        state.leases.insert(
            name.to_string(),
            Lease {
                holder: holder.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn release_lease(&self, name: &str, holder: &str) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        if state.leases.get(name).is_some_and(|l| l.holder == holder) {
            state.leases.remove(name);
        }
        Ok(())
    }

    async fn insert_freshness_snapshot(
        &self,
        org: &str,
        statuses: &[FreshnessStatus],
    ) -> Result<(), DbError> {
        self.state
            .lock()
            .await
            .snapshots
            .extend(statuses.iter().map(|s| (org.to_string(), s.clone())));
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
