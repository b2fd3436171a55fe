//! Topic Lifecycle Manager.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Utc};
use futures::stream::{self, StreamExt};
use seoflow_core::{
    normalize_keyword, Caller, Draft, GateConfig, GateResult, GateStatus, PageType,
    ProposalConfig, PublishedPage, Role, SegmentType, SeoRunKind, Topic, TopicStatus,
};
use seoflow_db::{PipelineStore, TopicTransition};
use seoflow_gate::GateContext;
use seoflow_metrics::{score_opportunities, MetricsEngine, SegmentOpportunity};
use serde::Serialize;
use uuid::Uuid;

use crate::generator::{DraftGenerator, DraftRequest, UnconfiguredGenerator};
use crate::keywords::{rank_score, traffic_score, KeywordResearch, KeywordStats, NoKeywordResearch};
use crate::lifecycle::ensure_transition;
use crate::runs::RunRecorder;
use crate::slug::slugify;
use crate::ContentError;

const DEFAULT_GENERATOR_TIMEOUT: Duration = Duration::from_secs(120);
const KEYWORD_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
const KEYWORD_LOOKUP_CONCURRENCY: usize = 4;
/// Booking history considered when proposing.
const PROPOSAL_LOOKBACK_DAYS: u64 = 90;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalSummary {
    pub run_id: Uuid,
    pub proposed: Vec<Topic>,
    /// Candidates whose keyword already belonged to a topic.
    pub duplicates: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOutcome {
    pub topic: Topic,
    pub draft: Draft,
    pub gate: GateResult,
}

struct Candidate {
    opportunity: SegmentOpportunity,
    keyword: String,
    stats: KeywordStats,
}

#[derive(Clone)]
pub struct TopicManager {
    store: Arc<dyn PipelineStore>,
    metrics: MetricsEngine,
    proposals: ProposalConfig,
    gate: GateConfig,
    generator: Arc<dyn DraftGenerator>,
    generator_timeout: Duration,
    keywords: Arc<dyn KeywordResearch>,
}

impl TopicManager {
    /// Manager with no draft generator and no keyword research.
    #[must_use]
    pub fn new(
        store: Arc<dyn PipelineStore>,
        metrics: MetricsEngine,
        proposals: ProposalConfig,
        gate: GateConfig,
    ) -> Self {
        Self {
            store,
            metrics,
            proposals,
            gate,
            generator: Arc::new(UnconfiguredGenerator),
            generator_timeout: DEFAULT_GENERATOR_TIMEOUT,
            keywords: Arc::new(NoKeywordResearch),
        }
    }

    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn DraftGenerator>) -> Self {
        self.generator = generator;
        self
    }

    #[must_use]
    pub fn with_generator_timeout(mut self, timeout: Duration) -> Self {
        self.generator_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_keyword_research(mut self, keywords: Arc<dyn KeywordResearch>) -> Self {
        self.keywords = keywords;
        self
    }

    pub(crate) fn store(&self) -> &dyn PipelineStore {
        self.store.as_ref()
    }

    /// Scores every segment of the last 90 days and proposes the best
    /// uncovered ones. `limit` defaults to the configured proposal limit.
    ///
    /// # Errors
    ///
    /// Authorization, metrics, and store errors.
    pub async fn propose(
        &self,
        caller: &Caller,
        org: &str,
        limit: Option<usize>,
    ) -> Result<ProposalSummary, ContentError> {
        caller.require(Role::Admin)?;
        let to = Utc::now().date_naive();
        let from = to
            .checked_sub_days(Days::new(PROPOSAL_LOOKBACK_DAYS))
            .unwrap_or(to);

        let existing = self.store.list_topics(org, None).await?;
        let covered: HashSet<(SegmentType, &str)> = existing
            .iter()
            .filter(|t| t.status != TopicStatus::Rejected)
            .filter_map(|t| Some((t.segment_type?, t.segment_value.as_deref()?)))
            .collect();

        let mut opportunities = Vec::new();
        for segment_type in SegmentType::ALL {
            let segments = self
                .metrics
                .live_segments(org, from, to, segment_type)
                .await?;
            opportunities.extend(score_opportunities(&segments, |s| {
                if covered.contains(&(s.segment_type, s.segment_value.as_str())) {
                    1.0
                } else {
                    0.0
                }
            }));
        }

        self.propose_from(caller, org, &opportunities, limit).await
    }

    /// Creates up to `limit` topics from `opportunities`. A keyword already
    /// held by any topic of the org is never proposed again.
    ///
    /// # Errors
    ///
    /// Authorization and store errors.
    pub async fn propose_from(
        &self,
        caller: &Caller,
        org: &str,
        opportunities: &[SegmentOpportunity],
        limit: Option<usize>,
    ) -> Result<ProposalSummary, ContentError> {
        caller.require(Role::Admin)?;
        let limit = limit.unwrap_or(self.proposals.default_limit);
        let recorder = RunRecorder::start(org, SeoRunKind::Propose, caller);

        let candidates = self.research(opportunities).await;
        let max_volume = candidates
            .iter()
            .map(|c| c.stats.monthly_volume)
            .max()
            .unwrap_or(0);
        let mut ranked: Vec<(f64, Candidate)> = candidates
            .into_iter()
            .map(|c| {
                let rank = rank_score(
                    c.opportunity.profit_score(),
                    traffic_score(c.stats.monthly_volume, max_volume),
                    c.stats.difficulty,
                );
                (rank, c)
            })
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.keyword.cmp(&b.1.keyword)));

        let mut proposed = Vec::new();
        let mut duplicates = 0;
        for (_, candidate) in ranked {
            if proposed.len() >= limit {
                break;
            }
            let topic = self.topic_for(org, &candidate);
            if self.store.insert_topic(&topic).await? {
                tracing::info!(org, topic_id = %topic.id, keyword = %topic.primary_keyword, "topic proposed");
                proposed.push(topic);
            } else {
                tracing::debug!(org, keyword = %candidate.keyword, "keyword already has a topic");
                duplicates += 1;
            }
        }

        let run = recorder
            .finish(self.store.as_ref(), "completed", proposed.len(), 0, Vec::new())
            .await?;
        Ok(ProposalSummary {
            run_id: run.id,
            proposed,
            duplicates,
        })
    }

    /// Keyword stats for each usable opportunity. Lookups that fail or time
    /// out fall back to [`KeywordStats::default`].
    async fn research(&self, opportunities: &[SegmentOpportunity]) -> Vec<Candidate> {
        let usable = opportunities.iter().filter_map(|opportunity| {
            let value = opportunity.segment_value.trim();
            if value.is_empty() || value.eq_ignore_ascii_case("unknown") {
                return None;
            }
            let keyword = self.proposals.keyword_for(opportunity.segment_type, value);
            (!normalize_keyword(&keyword).is_empty()).then(|| (opportunity.clone(), keyword))
        });

        stream::iter(usable)
            .map(|(opportunity, keyword)| {
                let keywords = Arc::clone(&self.keywords);
                async move {
                    let stats =
                        match tokio::time::timeout(KEYWORD_LOOKUP_TIMEOUT, keywords.lookup(&keyword))
                            .await
                        {
                            Ok(Ok(stats)) => stats,
                            Ok(Err(e)) => {
                                tracing::warn!(keyword = %keyword, source = keywords.name(), error = %e, "keyword lookup failed");
                                KeywordStats::default()
                            }
                            Err(_) => {
                                tracing::warn!(keyword = %keyword, source = keywords.name(), "keyword lookup timed out");
                                KeywordStats::default()
                            }
                        };
                    Candidate {
                        opportunity,
                        keyword,
                        stats,
                    }
                }
            })
            .boxed()
            .buffered(KEYWORD_LOOKUP_CONCURRENCY)
            .collect()
            .await
    }

    fn topic_for(&self, org: &str, candidate: &Candidate) -> Topic {
        let now = Utc::now();
        let opportunity = &candidate.opportunity;
        let slug = slugify(&candidate.keyword);
        Topic {
            id: Uuid::new_v4(),
            org: org.to_string(),
            title: title_case(&candidate.keyword),
            target_url: format!("/{slug}"),
            slug,
            page_type: PageType::for_segment(opportunity.segment_type),
            site_slug: self.proposals.site.site_slug.clone(),
            primary_keyword: candidate.keyword.clone(),
            normalized_keyword: normalize_keyword(&candidate.keyword),
            secondary_keywords: candidate.stats.related.clone(),
            status: TopicStatus::Proposed,
            profit_score: opportunity.profit_score(),
            estimated_traffic: candidate.stats.monthly_volume,
            difficulty: candidate.stats.difficulty,
            segment_type: Some(opportunity.segment_type),
            segment_value: Some(opportunity.segment_value.clone()),
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Generates a draft, stores it, and evaluates it. A failed evaluation
    /// blocks the topic; otherwise it waits in `draft` for approval.
    ///
    /// # Errors
    ///
    /// Authorization, [`ContentError::IllegalTransition`] for topics that
    /// cannot take a new draft, generator failures and timeouts (the topic is
    /// untouched), and store errors.
    pub async fn generate_draft(
        &self,
        caller: &Caller,
        topic_id: Uuid,
    ) -> Result<GenerationOutcome, ContentError> {
        caller.require(Role::Admin)?;
        let topic = self.load(topic_id).await?;
        if topic.status != TopicStatus::Draft {
            ensure_transition(&topic, TopicStatus::Draft)?;
        }

        let city = city_of(&topic);
        let request = DraftRequest {
            topic_id,
            org: topic.org.clone(),
            site_slug: topic.site_slug.clone(),
            base_url: self.proposals.site.base_url.clone(),
            title: topic.title.clone(),
            page_type: topic.page_type,
            primary_keyword: topic.primary_keyword.clone(),
            secondary_keywords: topic.secondary_keywords.clone(),
            target_url: topic.target_url.clone(),
            local_entities: city
                .map(|c| self.gate.entities_for(c).to_vec())
                .unwrap_or_default(),
        };
        let content =
            match tokio::time::timeout(self.generator_timeout, self.generator.generate(&request))
                .await
            {
                Ok(result) => result?,
                Err(_) => {
                    tracing::error!(
                        %topic_id,
                        generator = self.generator.name(),
                        timeout_secs = self.generator_timeout.as_secs(),
                        "draft generation timed out"
                    );
                    return Err(ContentError::GeneratorTimeout {
                        topic_id,
                        timeout_secs: self.generator_timeout.as_secs(),
                    });
                }
            };

        let draft = Draft {
            id: Uuid::new_v4(),
            topic_id,
            word_count: i64::try_from(content.word_count()).unwrap_or(i64::MAX),
            content,
            generated_at: Utc::now(),
        };
        self.store.put_draft(&draft).await?;

        let mut topic = topic;
        if topic.status != TopicStatus::Draft {
            topic = self
                .store
                .transition_topic(&TopicTransition::new(
                    topic_id,
                    topic.status,
                    TopicStatus::Draft,
                    Utc::now(),
                ))
                .await?;
        }

        let published = self.store.list_published_pages(&topic.org).await?;
        let gate = self.evaluate_with(&topic, &draft, &published);
        self.store.append_gate_result(&gate).await?;

        if gate.overall_status == GateStatus::Failed {
            topic = self
                .store
                .transition_topic(&TopicTransition::new(
                    topic_id,
                    TopicStatus::Draft,
                    TopicStatus::Blocked,
                    Utc::now(),
                ))
                .await?;
        }
        tracing::info!(
            %topic_id,
            draft_id = %draft.id,
            words = draft.word_count,
            gate = %gate.overall_status,
            status = %topic.status,
            "draft generated"
        );
        Ok(GenerationOutcome { topic, draft, gate })
    }

    /// Evaluates `draft` in the context of the org's live pages.
    pub(crate) fn evaluate_with(
        &self,
        topic: &Topic,
        draft: &Draft,
        published: &[PublishedPage],
    ) -> GateResult {
        let known_urls = published
            .iter()
            .map(|p| p.target_url.clone())
            .chain(self.gate.static_pages.iter().cloned());
        let city = city_of(topic);
        let entities = city.map_or(&[][..], |c| self.gate.entities_for(c));
        let ctx = GateContext::new(published, known_urls, entities, city, &topic.primary_keyword);
        seoflow_gate::evaluate(draft, topic.page_type, &ctx)
    }

    /// Moves an evaluated topic to `ready` and records the approver.
    ///
    /// # Errors
    ///
    /// Authorization, [`ContentError::IllegalTransition`],
    /// [`ContentError::NoDraft`], [`ContentError::NoGateResult`], and
    /// [`ContentError::GateFailed`]. The topic is unchanged on error.
    pub async fn approve(&self, caller: &Caller, topic_id: Uuid) -> Result<Topic, ContentError> {
        caller.require(Role::Admin)?;
        let topic = self.load(topic_id).await?;
        ensure_transition(&topic, TopicStatus::Ready)?;
        if self.store.get_draft(topic_id).await?.is_none() {
            return Err(ContentError::NoDraft(topic_id));
        }
        let gate = self
            .store
            .latest_gate_result(topic_id)
            .await?
            .ok_or(ContentError::NoGateResult(topic_id))?;
        if gate.overall_status == GateStatus::Failed {
            return Err(ContentError::GateFailed {
                topic_id,
                reasons: gate.fail_reasons(),
            });
        }

        let approved = self
            .store
            .transition_topic(
                &TopicTransition::new(topic_id, topic.status, TopicStatus::Ready, Utc::now())
                    .approved_by(caller.id.clone()),
            )
            .await?;
        tracing::info!(%topic_id, approver = %caller.id, gate = %gate.overall_status, "topic approved");
        Ok(approved)
    }

    /// # Errors
    ///
    /// Authorization, [`ContentError::IllegalTransition`] for published or
    /// rejected topics, and store errors.
    pub async fn reject(
        &self,
        caller: &Caller,
        topic_id: Uuid,
        reason: &str,
    ) -> Result<Topic, ContentError> {
        caller.require(Role::Admin)?;
        let topic = self.load(topic_id).await?;
        ensure_transition(&topic, TopicStatus::Rejected)?;
        let rejected = self
            .store
            .transition_topic(
                &TopicTransition::new(topic_id, topic.status, TopicStatus::Rejected, Utc::now())
                    .with_reason(reason.trim()),
            )
            .await?;
        tracing::info!(%topic_id, reason, "topic rejected");
        Ok(rejected)
    }

    /// Highest profit score first.
    ///
    /// # Errors
    ///
    /// Authorization and store errors.
    pub async fn list(
        &self,
        caller: &Caller,
        org: &str,
        status: Option<TopicStatus>,
    ) -> Result<Vec<Topic>, ContentError> {
        caller.require(Role::Viewer)?;
        Ok(self.store.list_topics(org, status).await?)
    }

    async fn load(&self, topic_id: Uuid) -> Result<Topic, ContentError> {
        self.store
            .get_topic(topic_id)
            .await?
            .ok_or(ContentError::NotFound(topic_id))
    }
}

pub(crate) fn city_of(topic: &Topic) -> Option<&str> {
    match topic.segment_type {
        Some(SegmentType::City) => topic.segment_value.as_deref(),
        _ => None,
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}
