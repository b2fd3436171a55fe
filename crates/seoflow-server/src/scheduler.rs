//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring pipeline jobs. None of them publishes; publishing stays an
//! explicit owner action.

use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, Utc};
use seoflow_core::Caller;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::api::AppState;

const METRICS_SCHEDULE: &str = "0 0 1 * * *";
const FRESHNESS_SCHEDULE: &str = "0 30 1 * * *";
const CONTENT_CYCLE_SCHEDULE: &str = "0 0 3 1,15 * *";

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(state: AppState) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_metrics_job(&scheduler, state.clone()).await?;
    register_freshness_job(&scheduler, state.clone()).await?;
    register_content_cycle_job(&scheduler, state).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Nightly at 01:00 UTC: recompute the month containing yesterday for every
/// org that has imported data.
async fn register_metrics_job(
    scheduler: &JobScheduler,
    state: AppState,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(METRICS_SCHEDULE, move |_uuid, _lock| {
        let state = state.clone();
        Box::pin(async move {
            tracing::info!("scheduler: starting nightly metrics refresh");
            run_metrics_job(&state).await;
            tracing::info!("scheduler: nightly metrics refresh complete");
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Nightly at 01:30 UTC, after the metrics refresh.
async fn register_freshness_job(
    scheduler: &JobScheduler,
    state: AppState,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(FRESHNESS_SCHEDULE, move |_uuid, _lock| {
        let state = state.clone();
        Box::pin(async move {
            run_freshness_job(&state).await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// 03:00 UTC on the 1st and 15th: propose, draft every new proposal, then
/// re-run the quality gate.
async fn register_content_cycle_job(
    scheduler: &JobScheduler,
    state: AppState,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(CONTENT_CYCLE_SCHEDULE, move |_uuid, _lock| {
        let state = state.clone();
        Box::pin(async move {
            tracing::info!("scheduler: starting biweekly content cycle");
            run_content_cycle(&state).await;
            tracing::info!("scheduler: biweekly content cycle complete");
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// First and last day of the month containing `day`.
pub(crate) fn month_of(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = day.with_day(1).unwrap_or(day);
    let next_month = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    let last = next_month.and_then(|d| d.pred_opt()).unwrap_or(day);
    (first, last)
}

async fn orgs(state: &AppState) -> Vec<String> {
    match state.store.list_import_orgs().await {
        Ok(orgs) => orgs,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to load orgs");
            Vec::new()
        }
    }
}

pub(crate) async fn run_freshness_job(state: &AppState) {
    for org in orgs(state).await {
        match state.freshness.record_snapshot(&org).await {
            Ok(statuses) => tracing::info!(
                org = %org,
                sources = statuses.len(),
                "scheduler: freshness snapshot stored"
            ),
            Err(e) => {
                tracing::error!(org = %org, error = %e, "scheduler: freshness snapshot failed");
            }
        }
    }
}

pub(crate) async fn run_metrics_job(state: &AppState) {
    let yesterday = Utc::now().date_naive() - ChronoDuration::days(1);
    let (from, to) = month_of(yesterday);
    let caller = Caller::system();

    for org in orgs(state).await {
        match state.metrics.compute_metrics(&caller, &org, from, to).await {
            Ok(summary) => tracing::info!(
                org = %org,
                %from,
                %to,
                computed = summary.computed,
                "scheduler: metrics refreshed"
            ),
            Err(e) => tracing::error!(org = %org, error = %e, "scheduler: metrics refresh failed"),
        }
    }
}

pub(crate) async fn run_content_cycle(state: &AppState) {
    let caller = Caller::system();

    for org in orgs(state).await {
        let proposals = match state.topics.propose(&caller, &org, None).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(org = %org, error = %e, "scheduler: proposal failed");
                continue;
            }
        };

        let mut drafted = 0usize;
        for topic in &proposals.proposed {
            match state.topics.generate_draft(&caller, topic.id).await {
                Ok(_) => drafted += 1,
                Err(e) => tracing::warn!(
                    org = %org,
                    topic_id = %topic.id,
                    error = %e,
                    "scheduler: draft generation failed"
                ),
            }
        }

        match state.topics.run_quality_gate(&caller, &org).await {
            Ok(gate) => tracing::info!(
                org = %org,
                proposed = proposals.proposed.len(),
                drafted,
                gate = %gate.status,
                blocked = gate.blocked,
                "scheduler: content cycle finished"
            ),
            Err(e) => tracing::error!(org = %org, error = %e, "scheduler: quality gate run failed"),
        }
    }
}
