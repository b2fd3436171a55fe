use chrono::NaiveDate;
use seoflow_core::CoreError;
use seoflow_db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("invalid date range: {from} is after {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },

    #[error("ad-spend attribution did not finish within {timeout_secs}s")]
    AttributionTimeout { timeout_secs: u64 },

    #[error("ad-spend attribution failed: {0}")]
    Attribution(String),

    #[error(transparent)]
    Db(#[from] DbError),
}
