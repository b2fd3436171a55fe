//! Freshness Monitor.
//!
//! Read-only by default: [`FreshnessMonitor::check_all`] never writes.
//! Only [`FreshnessMonitor::record_snapshot`] persists anything.
//!
//! Import and proposal sources are measured per org. Directory sources are
//! shared exports and read the same for every org.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use seoflow_core::{
    FeedClass, FeedType, FreshnessConfig, FreshnessSourceConfig, FreshnessSourceKind,
    FreshnessState, FreshnessStatus,
};
use seoflow_db::PipelineStore;

use crate::ContentError;

/// Age in hours and state of a source last updated at `last_updated`.
/// Timestamps in the future count as age zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn classify(
    class: FeedClass,
    last_updated: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> (Option<f64>, FreshnessState) {
    let Some(updated) = last_updated else {
        return (None, FreshnessState::Missing);
    };
    let age_hours = ((now - updated).num_seconds().max(0) as f64) / 3600.0;
    let threshold = class.threshold_hours();
    let state = if age_hours < threshold {
        FreshnessState::Fresh
    } else if age_hours < 2.0 * threshold {
        FreshnessState::Stale
    } else {
        FreshnessState::Critical
    };
    (Some(age_hours), state)
}

/// Why publishing should stop, one entry per offending source.
#[must_use]
pub fn freeze_reasons(statuses: &[FreshnessStatus]) -> Vec<String> {
    statuses
        .iter()
        .filter_map(|s| match (s.status, s.age_hours) {
            (FreshnessState::Missing, _) => Some(format!("{}: no data", s.source)),
            (FreshnessState::Critical, Some(age)) => {
                Some(format!("{}: critical, {age:.0}h old", s.source))
            }
            (_, Some(age)) if age > s.class.freeze_after_hours() => Some(format!(
                "{}: {age:.0}h old, {} ceiling is {:.0}h",
                s.source,
                s.class.as_str(),
                s.class.freeze_after_hours()
            )),
            (FreshnessState::Critical, None) => Some(format!("{}: critical", s.source)),
            _ => None,
        })
        .collect()
}

#[must_use]
pub fn should_freeze(statuses: &[FreshnessStatus]) -> bool {
    !freeze_reasons(statuses).is_empty()
}

#[derive(Clone)]
pub struct FreshnessMonitor {
    store: Arc<dyn PipelineStore>,
    sources: Vec<FreshnessSourceConfig>,
}

impl FreshnessMonitor {
    #[must_use]
    pub fn new(store: Arc<dyn PipelineStore>, config: &FreshnessConfig) -> Self {
        Self {
            store,
            sources: config.sources.clone(),
        }
    }

    /// # Errors
    ///
    /// Store errors while reading import or topic timestamps.
    pub async fn check_all(&self, org: &str) -> Result<Vec<FreshnessStatus>, ContentError> {
        self.check_all_at(org, Utc::now()).await
    }

    /// [`Self::check_all`] with an explicit clock.
    ///
    /// # Errors
    ///
    /// Store errors while reading import or topic timestamps.
    pub async fn check_all_at(
        &self,
        org: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<FreshnessStatus>, ContentError> {
        let mut statuses = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let last_updated = self.last_updated(org, source).await?;
            let (age_hours, status) = classify(source.class, last_updated, now);
            statuses.push(FreshnessStatus {
                source: source.name.clone(),
                class: source.class,
                last_updated,
                age_hours,
                status,
                checked_at: now,
            });
        }
        Ok(statuses)
    }

    /// Checks every source and stores the result for trend comparison.
    ///
    /// # Errors
    ///
    /// Store errors from the check or the snapshot write.
    pub async fn record_snapshot(&self, org: &str) -> Result<Vec<FreshnessStatus>, ContentError> {
        let statuses = self.check_all(org).await?;
        self.store.insert_freshness_snapshot(org, &statuses).await?;
        let frozen = should_freeze(&statuses);
        tracing::info!(org, sources = statuses.len(), frozen, "freshness snapshot recorded");
        Ok(statuses)
    }

    async fn last_updated(
        &self,
        org: &str,
        source: &FreshnessSourceConfig,
    ) -> Result<Option<DateTime<Utc>>, ContentError> {
        let updated = match source.kind {
            FreshnessSourceKind::BookingImports => {
                self.store
                    .latest_settled_import_at(org, FeedType::Booking)
                    .await?
            }
            FreshnessSourceKind::AdSpendImports => {
                self.store
                    .latest_settled_import_at(org, FeedType::AdSpend)
                    .await?
            }
            FreshnessSourceKind::ProposalQueue => self.store.latest_topic_created_at(org).await?,
            FreshnessSourceKind::Directory => match &source.path {
                Some(path) => directory_mtime(&source.name, path.clone()).await,
                None => None,
            },
        };
        Ok(updated)
    }
}

/// Unreadable directories are reported as missing data.
async fn directory_mtime(source: &str, path: PathBuf) -> Option<DateTime<Utc>> {
    let scanned = tokio::task::spawn_blocking(move || newest_mtime(&path)).await;
    match scanned {
        Ok(Ok(newest)) => newest.map(DateTime::<Utc>::from),
        Ok(Err(e)) => {
            tracing::warn!(source, error = %e, "freshness directory unreadable");
            None
        }
        Err(e) => {
            tracing::warn!(source, error = %e, "freshness directory scan panicked");
            None
        }
    }
}

/// Newest modification time of any file below `root`.
fn newest_mtime(root: &Path) -> std::io::Result<Option<SystemTime>> {
    if !root.exists() {
        return Ok(None);
    }
    let mut newest: Option<SystemTime> = None;
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if meta.is_dir() {
                pending.push(entry.path());
            } else {
                let modified = meta.modified()?;
                newest = Some(newest.map_or(modified, |n| n.max(modified)));
            }
        }
    }
    Ok(newest)
}
