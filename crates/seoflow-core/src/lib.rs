//! Shared domain model and configuration for the seoflow content pipeline.

mod app_config;
mod config;
pub mod freshness;
pub mod imports;
pub mod metrics;
pub mod pipeline_config;
pub mod roles;
pub mod topics;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use freshness::{FeedClass, FreshnessState, FreshnessStatus};
pub use imports::{
    AdMetricRecord, BookingRecord, FeedType, ImportRun, ImportStatus, RowIssue,
};
pub use metrics::{MetricsRollup, ProfitFigures, RollupKey, SegmentMetrics, SegmentType};
pub use pipeline_config::{
    load_pipeline_config, parse_pipeline_config, AttributionStrategy, CadencePolicy,
    FreshnessConfig, FreshnessSourceConfig, FreshnessSourceKind, GateConfig, IngestConfig,
    MarginEntry, MarginTable, MetricsConfig, PipelineConfig, ProposalConfig, SiteConfig,
    MAX_BATCH_SIZE, MAX_ERROR_SAMPLES,
};
pub use roles::{Caller, Role};
pub use topics::{
    normalize_keyword, CallToAction, CategoryResult, CtaKind, Draft, DraftContent, DraftImage,
    GateCategory, GateIssue, GateResult, GateStatus, ImageRole, PageType, PublishManifest,
    PublishedPage,
    SeoRun, SeoRunKind, Severity, SkippedTopic, Topic, TopicStatus,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read pipeline config {path}: {source}")]
    PipelineFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse pipeline config: {0}")]
    PipelineFileParse(#[from] serde_yaml::Error),

    #[error("config validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown {kind} value: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("caller {caller} has role {actual}, but {required} is required")]
    Forbidden {
        caller: String,
        actual: Role,
        required: Role,
    },
}
