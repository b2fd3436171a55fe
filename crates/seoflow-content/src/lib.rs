//! Content side of the pipeline: data freshness, the topic lifecycle from
//! proposal to publication, the draft generator seam, and the publish
//! scheduler.

mod freshness;
mod gate_run;
mod generator;
mod keywords;
mod lifecycle;
mod publish;
mod retry;
mod runs;
mod slug;
mod topics;

use seoflow_core::{CoreError, TopicStatus};
use seoflow_db::DbError;
use seoflow_metrics::MetricsError;
use thiserror::Error;
use uuid::Uuid;

pub use freshness::{classify, freeze_reasons, should_freeze, FreshnessMonitor};
pub use gate_run::GateRunSummary;
pub use generator::{
    DraftGenerator, DraftRequest, GeneratorError, HttpDraftGenerator, UnconfiguredGenerator,
};
pub use keywords::{rank_score, KeywordResearch, KeywordStats, NoKeywordResearch};
pub use lifecycle::{ensure_transition, is_legal_transition};
pub use publish::{PublishHold, PublishOutcome, PublishScheduler};
pub use slug::slugify;
pub use topics::{GenerationOutcome, ProposalSummary, TopicManager};

#[derive(Debug, Error)]
pub enum ContentError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("topic {0} not found")]
    NotFound(Uuid),

    #[error("topic {topic_id} cannot move from {from} to {to}")]
    IllegalTransition {
        topic_id: Uuid,
        from: TopicStatus,
        to: TopicStatus,
    },

    #[error("topic {0} has no draft")]
    NoDraft(Uuid),

    #[error("draft for topic {0} has not been evaluated")]
    NoGateResult(Uuid),

    #[error("draft for topic {topic_id} failed the quality gate: {}", reasons.join("; "))]
    GateFailed { topic_id: Uuid, reasons: Vec<String> },

    #[error("draft generation failed: {0}")]
    Generator(#[from] GeneratorError),

    #[error("draft generation for topic {topic_id} timed out after {timeout_secs}s")]
    GeneratorTimeout { topic_id: Uuid, timeout_secs: u64 },

    #[error("another publish or rollback holds the pipeline lease")]
    Busy,

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Db(#[from] DbError),
}
