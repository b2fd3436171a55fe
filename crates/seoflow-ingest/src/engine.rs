use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use seoflow_core::{
    AdMetricRecord, Caller, FeedType, ImportRun, ImportStatus, IngestConfig, Role,
    RowIssue,
};
use seoflow_db::{BatchWrite, DbError, DuplicatePolicy, PipelineStore, PIPELINE_LEASE};
use serde::Serialize;
use uuid::Uuid;

use crate::coerce::{ad_metric_from_raw, booking_from_raw};
use crate::raw::{parse_feed, RawRecord};
use crate::IngestError;

const ROLLBACK_LEASE_TTL: Duration = Duration::from_secs(300);

/// One feed handed to the engine: a header row followed by data rows.
#[derive(Debug, Clone)]
pub struct FeedRequest {
    pub org: String,
    pub source_label: String,
    pub raw_rows: Vec<Vec<String>>,
    /// Bookings only. Ad rows always merge.
    pub skip_duplicates: bool,
}

impl FeedRequest {
    pub fn new(
        org: impl Into<String>,
        source_label: impl Into<String>,
        raw_rows: Vec<Vec<String>>,
    ) -> Self {
        Self {
            org: org.into(),
            source_label: source_label.into(),
            raw_rows,
            skip_duplicates: true,
        }
    }

    #[must_use]
    pub fn allow_overwrite(mut self) -> Self {
        self.skip_duplicates = false;
        self
    }
}

/// Caller-facing result of one import call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    pub import_id: Uuid,
    pub feed_type: FeedType,
    pub status: ImportStatus,
    pub total_records: i64,
    pub imported: i64,
    pub updated: i64,
    pub skipped: i64,
    pub errors: i64,
    pub warnings: i64,
    pub error_details: Vec<RowIssue>,
    pub warning_details: Vec<RowIssue>,
}

impl From<&ImportRun> for ImportSummary {
    fn from(run: &ImportRun) -> Self {
        Self {
            import_id: run.id,
            feed_type: run.feed_type,
            status: run.status,
            total_records: run.total_rows,
            imported: run.imported_count,
            updated: run.updated_count,
            skipped: run.skipped_count,
            errors: run.error_count,
            warnings: run.warning_count,
            error_details: run.error_samples.clone(),
            warning_details: run.warning_samples.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RollbackOutcome {
    pub import_id: Uuid,
    pub deleted_count: u64,
}

/// Running tallies for one import. Counts are exact; samples are capped.
struct Tally {
    sample_limit: usize,
    write: BatchWrite,
    skipped_in_feed: u64,
    error_count: u64,
    warning_count: u64,
    errors: Vec<RowIssue>,
    warnings: Vec<RowIssue>,
}

impl Tally {
    fn new(sample_limit: usize) -> Self {
        Self {
            sample_limit,
            write: BatchWrite::default(),
            skipped_in_feed: 0,
            error_count: 0,
            warning_count: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn error(&mut self, issue: RowIssue) {
        self.error_count += 1;
        if self.errors.len() < self.sample_limit {
            self.errors.push(issue);
        }
    }

    fn warnings(&mut self, issues: Vec<RowIssue>) {
        for issue in issues {
            tracing::debug!(row = issue.row, field = %issue.field, "{}", issue.message);
            self.warning_count += 1;
            if self.warnings.len() < self.sample_limit {
                self.warnings.push(issue);
            }
        }
    }

    fn batch_failed(&mut self, rows: &[usize], error: &DbError) {
        let first_row = rows.first().copied().unwrap_or(0);
        tracing::error!(
            first_row,
            batch_len = rows.len(),
            error = %error,
            "batch write failed"
        );
        self.error_count += rows.len() as u64;
        if self.errors.len() < self.sample_limit {
            self.errors.push(RowIssue {
                row: first_row,
                field: "batch".to_string(),
                message: format!("write of {} rows failed: {error}", rows.len()),
            });
        }
    }
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Turns raw feeds into stored records, one reversible run per call.
///
/// Constructed once at start-up and shared; it holds no per-import state.
#[derive(Clone)]
pub struct IngestionEngine {
    store: Arc<dyn PipelineStore>,
    config: IngestConfig,
}

impl IngestionEngine {
    #[must_use]
    pub fn new(store: Arc<dyn PipelineStore>, config: IngestConfig) -> Self {
        Self { store, config }
    }

    /// Imports trip records. Existing trip ids are skipped unless the request
    /// allows overwrite.
    ///
    /// # Errors
    ///
    /// Authorization and header problems fail before a run is created. Row
    /// and batch problems never fail the call; they land in the summary.
    pub async fn import_booking_feed(
        &self,
        caller: &Caller,
        request: FeedRequest,
    ) -> Result<ImportSummary, IngestError> {
        caller.require(Role::ContentEditor)?;
        let raw = parse_feed(FeedType::Booking, &request.raw_rows)?;
        let mut run = self.start_run(caller, &request, FeedType::Booking, raw.len()).await?;
        let mut tally = Tally::new(self.config.error_sample_limit);

        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(raw.len());
        let mut rows = Vec::with_capacity(raw.len());
        for record in raw {
            let RawRecord::Booking(booking) = record else {
                continue;
            };
            let row = booking.row;
            let mut warnings = Vec::new();
            match booking_from_raw(booking, &request.org, run.id, &mut warnings) {
                Ok(parsed) => {
                    tally.warnings(warnings);
                    if seen.insert(parsed.trip_id.clone()) {
                        records.push(parsed);
                        rows.push(row);
                    } else {
                        tally.skipped_in_feed += 1;
                    }
                }
                Err(issue) => tally.error(issue),
            }
        }

        let policy = if request.skip_duplicates {
            DuplicatePolicy::Skip
        } else {
            DuplicatePolicy::Overwrite
        };
        self.write_in_batches(&records, &rows, &mut tally, |chunk| {
            self.store.write_bookings(chunk, policy)
        })
        .await;

        self.finish_run(&mut run, tally).await
    }

    /// Imports ad-platform rows, merging by `(campaign_id, date)` so restated
    /// history replaces what was stored.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::import_booking_feed`].
    pub async fn import_ad_spend_feed(
        &self,
        caller: &Caller,
        request: FeedRequest,
    ) -> Result<ImportSummary, IngestError> {
        caller.require(Role::ContentEditor)?;
        let raw = parse_feed(FeedType::AdSpend, &request.raw_rows)?;
        let mut run = self.start_run(caller, &request, FeedType::AdSpend, raw.len()).await?;
        let mut tally = Tally::new(self.config.error_sample_limit);

        // Last occurrence of a key inside the feed wins.
        let mut slots: Vec<Option<(usize, AdMetricRecord)>> = Vec::with_capacity(raw.len());
        let mut latest: HashMap<(String, NaiveDate), usize> = HashMap::new();
        for record in raw {
            let RawRecord::AdSpend(ad) = record else {
                continue;
            };
            let row = ad.row;
            let mut warnings = Vec::new();
            match ad_metric_from_raw(ad, &request.org, run.id, &mut warnings) {
                Ok(parsed) => {
                    tally.warnings(warnings);
                    let key = (parsed.campaign_id.clone(), parsed.metric_date);
                    if let Some(previous) = latest.insert(key, slots.len()) {
                        slots[previous] = None;
                        tally.skipped_in_feed += 1;
                    }
                    slots.push(Some((row, parsed)));
                }
                Err(issue) => tally.error(issue),
            }
        }
        let (rows, records): (Vec<usize>, Vec<AdMetricRecord>) = slots.into_iter().flatten().unzip();

        self.write_in_batches(&records, &rows, &mut tally, |chunk| {
            self.store.upsert_ad_metrics(chunk)
        })
        .await;

        self.finish_run(&mut run, tally).await
    }

    /// Deletes every record written by `import_id` and marks the run
    /// rolled back. Holds the pipeline lease so a publish cannot overlap.
    ///
    /// # Errors
    ///
    /// [`IngestError::NotFound`], [`IngestError::AlreadyRolledBack`],
    /// [`IngestError::RunInProgress`], or [`IngestError::Busy`] when a publish
    /// holds the lease.
    pub async fn rollback(
        &self,
        caller: &Caller,
        import_id: Uuid,
    ) -> Result<RollbackOutcome, IngestError> {
        caller.require(Role::Admin)?;
        let run = self
            .store
            .get_import_run(import_id)
            .await?
            .ok_or(IngestError::NotFound(import_id))?;
        match run.status {
            ImportStatus::RolledBack => return Err(IngestError::AlreadyRolledBack(import_id)),
            ImportStatus::Processing => return Err(IngestError::RunInProgress(import_id)),
            ImportStatus::Completed | ImportStatus::CompletedWithErrors => {}
        }

        let holder = format!("rollback:{import_id}");
        if !self
            .store
            .try_acquire_lease(PIPELINE_LEASE, &holder, ROLLBACK_LEASE_TTL)
            .await?
        {
            return Err(IngestError::Busy);
        }

        let result = self.rollback_locked(import_id).await;

        if let Err(e) = self.store.release_lease(PIPELINE_LEASE, &holder).await {
            tracing::warn!(import_run_id = %import_id, error = %e, "failed to release pipeline lease");
        }
        result
    }

    async fn rollback_locked(&self, import_id: Uuid) -> Result<RollbackOutcome, IngestError> {
        let deleted_count = self.store.delete_records_for_import(import_id).await?;
        match self.store.mark_import_rolled_back(import_id, Utc::now()).await {
            Ok(()) => {}
            Err(DbError::InvalidTransition { .. }) => {
                return Err(IngestError::AlreadyRolledBack(import_id));
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!(import_run_id = %import_id, deleted_count, "import rolled back");
        Ok(RollbackOutcome {
            import_id,
            deleted_count,
        })
    }

    /// Newest first.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] on authorization or store failure.
    pub async fn list_imports(
        &self,
        caller: &Caller,
        limit: i64,
    ) -> Result<Vec<ImportRun>, IngestError> {
        caller.require(Role::Viewer)?;
        Ok(self.store.list_import_runs(limit).await?)
    }

    async fn start_run(
        &self,
        caller: &Caller,
        request: &FeedRequest,
        feed_type: FeedType,
        total_rows: usize,
    ) -> Result<ImportRun, IngestError> {
        let run = ImportRun {
            id: Uuid::new_v4(),
            org: request.org.clone(),
            feed_type,
            source_label: request.source_label.clone(),
            status: ImportStatus::Processing,
            total_rows: i64::try_from(total_rows).unwrap_or(i64::MAX),
            imported_count: 0,
            updated_count: 0,
            skipped_count: 0,
            error_count: 0,
            warning_count: 0,
            error_samples: Vec::new(),
            warning_samples: Vec::new(),
            created_by: Some(caller.id.clone()),
            started_at: Utc::now(),
            completed_at: None,
            rolled_back_at: None,
        };
        self.store.create_import_run(&run).await?;
        tracing::info!(
            import_run_id = %run.id,
            org = %run.org,
            feed_type = %feed_type,
            total_rows,
            "import started"
        );
        Ok(run)
    }

    /// Writes `records` in bounded batches, several in flight at once.
    /// A failed batch is counted and the rest carry on; committed batches stand.
    async fn write_in_batches<'a, T, F, Fut>(
        &self,
        records: &'a [T],
        rows: &'a [usize],
        tally: &mut Tally,
        write: F,
    ) where
        T: Sync,
        F: Fn(&'a [T]) -> Fut + Sync,
        Fut: Future<Output = Result<BatchWrite, DbError>> + Send + 'a,
    {
        let batch_size = self.config.batch_size.max(1);
        let concurrency = self.config.write_concurrency.max(1);

        let results: Vec<(&[usize], Result<BatchWrite, DbError>)> =
            stream::iter(records.chunks(batch_size).zip(rows.chunks(batch_size)))
                .map(|(chunk, chunk_rows)| {
                    let fut = write(chunk);
                    async move { (chunk_rows, fut.await) }
                })
                .boxed()
                .buffered(concurrency)
                .collect()
                .await;

        for (chunk_rows, result) in results {
            match result {
                Ok(outcome) => tally.write += outcome,
                Err(e) => tally.batch_failed(chunk_rows, &e),
            }
        }
    }

    async fn finish_run(
        &self,
        run: &mut ImportRun,
        tally: Tally,
    ) -> Result<ImportSummary, IngestError> {
        run.status = if tally.error_count > 0 {
            ImportStatus::CompletedWithErrors
        } else {
            ImportStatus::Completed
        };
        run.imported_count = to_i64(tally.write.inserted);
        run.updated_count = to_i64(tally.write.updated);
        run.skipped_count = to_i64(tally.write.skipped + tally.skipped_in_feed);
        run.error_count = to_i64(tally.error_count);
        run.warning_count = to_i64(tally.warning_count);
        run.error_samples = tally.errors;
        run.warning_samples = tally.warnings;
        run.completed_at = Some(Utc::now());

        if let Err(e) = self.store.finish_import_run(run).await {
            self.settle_run_best_effort(run, &e).await;
            return Err(e.into());
        }

        if run.error_count > 0 {
            tracing::warn!(
                import_run_id = %run.id,
                errors = run.error_count,
                imported = run.imported_count,
                "import completed with errors"
            );
        } else {
            tracing::info!(
                import_run_id = %run.id,
                imported = run.imported_count,
                updated = run.updated_count,
                skipped = run.skipped_count,
                warnings = run.warning_count,
                "import completed"
            );
        }
        Ok(ImportSummary::from(&*run))
    }

    /// Attempt to leave a run whose final update failed as
    /// `completed_with_errors`, so its records can still be rolled back.
    async fn settle_run_best_effort(&self, run: &ImportRun, error: &DbError) {
        let mut settled = run.clone();
        settled.status = ImportStatus::CompletedWithErrors;
        settled.error_count = settled.error_count.saturating_add(1);
        if settled.error_samples.len() < self.config.error_sample_limit {
            settled.error_samples.push(RowIssue {
                row: 0,
                field: "run".to_string(),
                message: format!("final run update failed: {error}"),
            });
        }
        match self.store.finish_import_run(&settled).await {
            Ok(()) => tracing::warn!(
                import_run_id = %run.id,
                error = %error,
                "import run settled as completed_with_errors after a failed final update"
            ),
            Err(mark_err) => tracing::error!(
                import_run_id = %run.id,
                error = %mark_err,
                "failed to settle import run"
            ),
        }
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
