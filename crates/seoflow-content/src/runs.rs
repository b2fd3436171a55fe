use chrono::{DateTime, Utc};
use seoflow_core::{Caller, SeoRun, SeoRunKind};
use seoflow_db::{DbError, PipelineStore};
use uuid::Uuid;

/// An [`SeoRun`] being timed. Written once, on [`RunRecorder::finish`].
pub(crate) struct RunRecorder {
    id: Uuid,
    org: String,
    kind: SeoRunKind,
    triggered_by: String,
    started_at: DateTime<Utc>,
}

impl RunRecorder {
    pub(crate) fn start(org: &str, kind: SeoRunKind, caller: &Caller) -> Self {
        Self {
            id: Uuid::new_v4(),
            org: org.to_string(),
            kind,
            triggered_by: caller.id.clone(),
            started_at: Utc::now(),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) async fn finish(
        self,
        store: &dyn PipelineStore,
        status: &str,
        items_processed: usize,
        items_failed: usize,
        fail_reasons: Vec<String>,
    ) -> Result<SeoRun, DbError> {
        let run = SeoRun {
            id: self.id,
            org: self.org,
            kind: self.kind,
            status: status.to_string(),
            items_processed: i64::try_from(items_processed).unwrap_or(i64::MAX),
            items_failed: i64::try_from(items_failed).unwrap_or(i64::MAX),
            fail_reasons,
            triggered_by: self.triggered_by,
            started_at: self.started_at,
            completed_at: Utc::now(),
        };
        store.insert_seo_run(&run).await?;
        tracing::debug!(
            run_id = %run.id,
            kind = run.kind.as_str(),
            status = %run.status,
            "seo run recorded"
        );
        Ok(run)
    }
}
