use chrono::Utc;
use seoflow_core::{Caller, GateStatus, Role, SeoRunKind, TopicStatus};
use seoflow_db::TopicTransition;
use serde::Serialize;
use uuid::Uuid;

use crate::runs::RunRecorder;
use crate::topics::TopicManager;
use crate::ContentError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateRunSummary {
    pub run_id: Uuid,
    /// Worst outcome across the evaluated drafts; `passed` when none were.
    pub status: GateStatus,
    pub fail_reasons: Vec<String>,
    pub evaluated: usize,
    pub blocked: usize,
}

impl TopicManager {
    /// Re-evaluates the current draft of every `draft` and `ready` topic of
    /// the org. Failures block their topic.
    ///
    /// # Errors
    ///
    /// Authorization and store errors. Topics evaluated before a store error
    /// keep their new results.
    pub async fn run_quality_gate(
        &self,
        caller: &Caller,
        org: &str,
    ) -> Result<GateRunSummary, ContentError> {
        caller.require(Role::Admin)?;
        let recorder = RunRecorder::start(org, SeoRunKind::Gate, caller);
        let store = self.store();

        let published = store.list_published_pages(org).await?;
        let mut status = GateStatus::Passed;
        let mut fail_reasons = Vec::new();
        let mut evaluated = 0;
        let mut blocked = 0;

        for from in [TopicStatus::Draft, TopicStatus::Ready] {
            for topic in store.list_topics(org, Some(from)).await? {
                let Some(draft) = store.get_draft(topic.id).await? else {
                    tracing::debug!(topic_id = %topic.id, "no draft to evaluate");
                    continue;
                };
                let result = self.evaluate_with(&topic, &draft, &published);
                store.append_gate_result(&result).await?;
                evaluated += 1;

                match result.overall_status {
                    GateStatus::Failed => {
                        store
                            .transition_topic(&TopicTransition::new(
                                topic.id,
                                from,
                                TopicStatus::Blocked,
                                Utc::now(),
                            ))
                            .await?;
                        blocked += 1;
                        status = GateStatus::Failed;
                        fail_reasons.extend(
                            result
                                .fail_reasons()
                                .into_iter()
                                .map(|reason| format!("{}: {reason}", topic.slug)),
                        );
                        tracing::warn!(topic_id = %topic.id, from = %from, "topic blocked by quality gate");
                    }
                    GateStatus::Warned if status == GateStatus::Passed => {
                        status = GateStatus::Warned;
                    }
                    GateStatus::Warned | GateStatus::Passed => {}
                }
            }
        }

        let run = recorder
            .finish(store, status.as_str(), evaluated, blocked, fail_reasons.clone())
            .await?;
        tracing::info!(org, run_id = %run.id, evaluated, blocked, status = %status, "quality gate run finished");
        Ok(GateRunSummary {
            run_id: run.id,
            status,
            fail_reasons,
            evaluated,
            blocked,
        })
    }
}
