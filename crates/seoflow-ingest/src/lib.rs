//! Ingestion Engine: turns raw tabular feeds into booking and ad-spend
//! records, one reversible [`ImportRun`](seoflow_core::ImportRun) per call.

mod coerce;
mod engine;
mod raw;

use seoflow_core::{CoreError, FeedType};
use seoflow_db::DbError;
use thiserror::Error;
use uuid::Uuid;

pub use engine::{FeedRequest, ImportSummary, IngestionEngine, RollbackOutcome};
pub use raw::{parse_feed, RawAdSpend, RawBooking, RawRecord};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("feed has no header row")]
    EmptyFeed,

    #[error("{feed_type} feed is missing required column '{column}'")]
    MissingColumn {
        feed_type: FeedType,
        column: &'static str,
    },

    #[error("import {0} not found")]
    NotFound(Uuid),

    #[error("import {0} is already rolled back")]
    AlreadyRolledBack(Uuid),

    #[error("import {0} is still processing")]
    RunInProgress(Uuid),

    #[error("another publish or rollback holds the pipeline lease")]
    Busy,

    #[error(transparent)]
    Db(#[from] DbError),
}
