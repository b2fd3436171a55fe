//! Publish Scheduler.
//!
//! Order of checks is fixed: authorization, data freshness, the pipeline
//! lease, cadence, then per-topic gate re-checks. A freeze returns before
//! any topic is read.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use seoflow_core::{
    CadencePolicy, Caller, GateStatus, PublishManifest, Role, SeoRunKind, SkippedTopic, Topic,
    TopicStatus,
};
use seoflow_db::{DbError, PipelineStore, TopicTransition, PIPELINE_LEASE};
use serde::Serialize;
use uuid::Uuid;

use crate::freshness::{freeze_reasons, FreshnessMonitor};
use crate::runs::RunRecorder;
use crate::ContentError;

const PUBLISH_LEASE_TTL: Duration = Duration::from_secs(300);

/// Why a publish call promoted nothing on purpose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PublishHold {
    /// Upstream data is too old to trust.
    Frozen { sources: Vec<String> },
    /// The previous manifest is too recent.
    Cadence {
        last_published_at: DateTime<Utc>,
        next_allowed_at: DateTime<Utc>,
    },
}

impl PublishHold {
    fn describe(&self) -> Vec<String> {
        match self {
            PublishHold::Frozen { sources } => sources.clone(),
            PublishHold::Cadence {
                next_allowed_at, ..
            } => vec![format!("cadence: next publish allowed at {next_allowed_at}")],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
    pub run_id: Uuid,
    pub published: usize,
    /// Present only when at least one topic went live.
    pub manifest_id: Option<Uuid>,
    pub topic_ids: Vec<Uuid>,
    pub skipped: Vec<SkippedTopic>,
    pub held: Option<PublishHold>,
}

enum Promotion {
    Published,
    Skipped(&'static str),
}

#[derive(Clone)]
pub struct PublishScheduler {
    store: Arc<dyn PipelineStore>,
    freshness: FreshnessMonitor,
    cadence: CadencePolicy,
}

impl PublishScheduler {
    #[must_use]
    pub fn new(
        store: Arc<dyn PipelineStore>,
        freshness: FreshnessMonitor,
        cadence: CadencePolicy,
    ) -> Self {
        Self {
            store,
            freshness,
            cadence,
        }
    }

    /// Promotes up to `min(limit, max_per_cycle)` ready topics, most
    /// profitable first, and writes one manifest listing exactly those.
    ///
    /// A store error mid-promotion stops the loop. Topics already promoted
    /// still get their manifest and the run is recorded as `failed` before
    /// the error is returned.
    ///
    /// # Errors
    ///
    /// Authorization, [`ContentError::Busy`] while a rollback or another
    /// publish holds the pipeline lease, and store errors.
    pub async fn publish(
        &self,
        caller: &Caller,
        org: &str,
        limit: usize,
    ) -> Result<PublishOutcome, ContentError> {
        caller.require(Role::Owner)?;
        let recorder = RunRecorder::start(org, SeoRunKind::Publish, caller);

        let statuses = self.freshness.check_all(org).await?;
        let frozen = freeze_reasons(&statuses);
        if !frozen.is_empty() {
            tracing::warn!(org, sources = ?frozen, "publishing frozen by stale data");
            return self
                .held(recorder, PublishHold::Frozen { sources: frozen })
                .await;
        }

        let holder = format!("publish:{org}:{}", recorder.id());
        if !self
            .store
            .try_acquire_lease(PIPELINE_LEASE, &holder, PUBLISH_LEASE_TTL)
            .await?
        {
            return Err(ContentError::Busy);
        }

        let result = self.publish_locked(recorder, caller, org, limit).await;

        if let Err(e) = self.store.release_lease(PIPELINE_LEASE, &holder).await {
            tracing::warn!(org, holder, error = %e, "failed to release pipeline lease");
        }
        result
    }

    async fn publish_locked(
        &self,
        recorder: RunRecorder,
        caller: &Caller,
        org: &str,
        limit: usize,
    ) -> Result<PublishOutcome, ContentError> {
        let now = Utc::now();
        if let Some(last) = self.store.latest_manifest(org).await? {
            let next_allowed_at =
                last.published_at + chrono::Duration::days(i64::from(self.cadence.min_days_between_publish));
            if now < next_allowed_at {
                tracing::warn!(org, %next_allowed_at, "publish held by cadence policy");
                return self
                    .held(
                        recorder,
                        PublishHold::Cadence {
                            last_published_at: last.published_at,
                            next_allowed_at,
                        },
                    )
                    .await;
            }
        }

        let cap = limit.min(usize::try_from(self.cadence.max_per_cycle).unwrap_or(usize::MAX));
        let candidates: Vec<_> = self
            .store
            .list_topics(org, Some(TopicStatus::Ready))
            .await?
            .into_iter()
            .take(cap)
            .collect();

        let mut promoted = Vec::new();
        let mut skipped = Vec::new();
        let mut failure = None;
        for topic in &candidates {
            match self.promote(topic, now).await {
                Ok(Promotion::Published) => {
                    tracing::info!(org, topic_id = %topic.id, url = %topic.target_url, "topic published");
                    promoted.push(topic.id);
                }
                Ok(Promotion::Skipped(reason)) => skipped.push(SkippedTopic {
                    topic_id: topic.id,
                    reason: reason.to_string(),
                }),
                Err(e) => {
                    tracing::error!(org, topic_id = %topic.id, error = %e, "publish stopped by store error");
                    failure = Some(e);
                    break;
                }
            }
        }

        let manifest_id = if promoted.is_empty() {
            None
        } else {
            let manifest = PublishManifest {
                id: Uuid::new_v4(),
                org: org.to_string(),
                published_at: now,
                topic_ids: promoted.clone(),
                published_count: i64::try_from(promoted.len()).unwrap_or(i64::MAX),
                candidate_count: i64::try_from(candidates.len()).unwrap_or(i64::MAX),
                skipped: skipped.clone(),
                published_by: caller.id.clone(),
            };
            match self.store.insert_manifest(&manifest).await {
                Ok(()) => Some(manifest.id),
                Err(e) => {
                    tracing::error!(org, published = promoted.len(), error = %e, "failed to write publish manifest");
                    failure.get_or_insert(e);
                    None
                }
            }
        };

        let mut reasons: Vec<String> = skipped
            .iter()
            .map(|s| format!("{}: {}", s.topic_id, s.reason))
            .collect();
        let status = match &failure {
            Some(e) => {
                reasons.push(format!("store error: {e}"));
                "failed"
            }
            None => "completed",
        };
        let finished = recorder
            .finish(
                self.store.as_ref(),
                status,
                promoted.len(),
                skipped.len(),
                reasons,
            )
            .await;

        if let Some(e) = failure {
            if let Err(record_err) = finished {
                tracing::warn!(org, error = %record_err, "failed to record failed publish run");
            }
            return Err(e.into());
        }
        let run = finished?;
        tracing::info!(org, run_id = %run.id, published = promoted.len(), skipped = skipped.len(), "publish finished");
        Ok(PublishOutcome {
            run_id: run.id,
            published: promoted.len(),
            manifest_id,
            topic_ids: promoted,
            skipped,
            held: None,
        })
    }

    /// Re-checks one ready topic's latest gate and moves it on.
    async fn promote(&self, topic: &Topic, now: DateTime<Utc>) -> Result<Promotion, DbError> {
        match self.store.latest_gate_result(topic.id).await? {
            None => Ok(Promotion::Skipped("no gate result")),
            Some(gate) if gate.overall_status == GateStatus::Failed => {
                self.store
                    .transition_topic(&TopicTransition::new(
                        topic.id,
                        TopicStatus::Ready,
                        TopicStatus::Blocked,
                        now,
                    ))
                    .await?;
                tracing::warn!(topic_id = %topic.id, "ready topic failed its latest gate, blocked");
                Ok(Promotion::Skipped("latest gate result failed"))
            }
            Some(_) => {
                let published = self
                    .store
                    .transition_topic(&TopicTransition::new(
                        topic.id,
                        TopicStatus::Ready,
                        TopicStatus::Published,
                        now,
                    ))
                    .await;
                match published {
                    Ok(_) => Ok(Promotion::Published),
                    Err(DbError::InvalidTransition { .. }) => {
                        Ok(Promotion::Skipped("status changed during publish"))
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    async fn held(
        &self,
        recorder: RunRecorder,
        hold: PublishHold,
    ) -> Result<PublishOutcome, ContentError> {
        let run = recorder
            .finish(self.store.as_ref(), "held", 0, 0, hold.describe())
            .await?;
        Ok(PublishOutcome {
            run_id: run.id,
            published: 0,
            manifest_id: None,
            topic_ids: Vec::new(),
            skipped: Vec::new(),
            held: Some(hold),
        })
    }
}
