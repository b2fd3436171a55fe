use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, FeedClass, SegmentType};

/// Upper bound on records per physical write.
pub const MAX_BATCH_SIZE: usize = 400;
/// Upper bound on inline error/warning samples kept per import run.
pub const MAX_ERROR_SAMPLES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginEntry {
    pub tax_rate: Decimal,
    pub payout_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginTable {
    pub default: MarginEntry,
    #[serde(default)]
    pub service_types: HashMap<String, MarginEntry>,
}

impl MarginTable {
    /// Rates for a service type, falling back to the default entry when unmapped.
    #[must_use]
    pub fn rates_for(&self, service_type: &str) -> MarginEntry {
        let wanted = service_type.trim();
        self.service_types
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
            .map_or(self.default, |(_, entry)| *entry)
    }
}

impl Default for MarginTable {
    fn default() -> Self {
        Self {
            default: MarginEntry {
                tax_rate: Decimal::new(10, 2),
                payout_rate: Decimal::new(40, 2),
            },
            service_types: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CadencePolicy {
    pub max_per_cycle: u32,
    pub min_days_between_publish: u32,
}

impl Default for CadencePolicy {
    fn default() -> Self {
        Self {
            max_per_cycle: 5,
            min_days_between_publish: 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessSourceKind {
    BookingImports,
    AdSpendImports,
    ProposalQueue,
    /// Newest file modification time under `path`.
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessSourceConfig {
    pub name: String,
    pub kind: FreshnessSourceKind,
    pub class: FeedClass,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessConfig {
    pub sources: Vec<FreshnessSourceConfig>,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            sources: vec![
                FreshnessSourceConfig {
                    name: "booking_feed".to_string(),
                    kind: FreshnessSourceKind::BookingImports,
                    class: FeedClass::Daily,
                    path: None,
                },
                FreshnessSourceConfig {
                    name: "ad_feed".to_string(),
                    kind: FreshnessSourceKind::AdSpendImports,
                    class: FeedClass::Daily,
                    path: None,
                },
                FreshnessSourceConfig {
                    name: "proposal_queue".to_string(),
                    kind: FreshnessSourceKind::ProposalQueue,
                    class: FeedClass::Weekly,
                    path: None,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub batch_size: usize,
    pub error_sample_limit: usize,
    /// Batches in flight at once. Each batch is still one atomic statement.
    pub write_concurrency: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            error_sample_limit: MAX_ERROR_SAMPLES,
            write_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub site_slug: String,
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_slug: "main".to_string(),
            base_url: "https://example.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProposalConfig {
    pub site: SiteConfig,
    pub default_limit: usize,
    /// Primary keyword template per segment type; `{value}` is replaced by
    /// the segment value.
    pub keyword_templates: BTreeMap<SegmentType, String>,
}

impl ProposalConfig {
    #[must_use]
    pub fn keyword_for(&self, segment_type: SegmentType, value: &str) -> String {
        let template = self
            .keyword_templates
            .get(&segment_type)
            .map_or("{value}", String::as_str);
        template.replace("{value}", value.trim())
    }
}

impl Default for ProposalConfig {
    fn default() -> Self {
        let keyword_templates = BTreeMap::from([
            (SegmentType::City, "{value} limo service".to_string()),
            (SegmentType::ServiceType, "{value} limo service".to_string()),
            (SegmentType::VehicleType, "{value} rental".to_string()),
            (SegmentType::BookingType, "{value} car service".to_string()),
        ]);
        Self {
            site: SiteConfig::default(),
            default_limit: 10,
            keyword_templates,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Recognized local entities (venues, neighborhoods, airports) keyed by
    /// lowercase city name.
    pub local_entities: BTreeMap<String, Vec<String>>,
    /// Internal paths that always resolve, such as `/contact`.
    pub static_pages: Vec<String>,
}

impl GateConfig {
    #[must_use]
    pub fn entities_for(&self, city: &str) -> &[String] {
        self.local_entities
            .get(&city.trim().to_lowercase())
            .map_or(&[][..], Vec::as_slice)
    }
}

/// How ingested ad spend is charged against bookings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionStrategy {
    #[default]
    None,
    RevenueShare,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub attribution: AttributionStrategy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub margins: MarginTable,
    #[serde(default)]
    pub cadence: CadencePolicy,
    #[serde(default)]
    pub freshness: FreshnessConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub proposals: ProposalConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Load and validate the pipeline configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_pipeline_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::PipelineFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_pipeline_config(&content)
}

/// Parse and validate pipeline YAML already in memory.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_pipeline_config(content: &str) -> Result<PipelineConfig, ConfigError> {
    let config: PipelineConfig = serde_yaml::from_str(content)?;
    validate_pipeline_config(&config)?;
    Ok(config)
}

fn validate_rate(label: &str, rate: Decimal) -> Result<(), ConfigError> {
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(ConfigError::Validation(format!(
            "{label} must be within [0, 1], got {rate}"
        )));
    }
    Ok(())
}

fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    validate_rate("margins.default.tax_rate", config.margins.default.tax_rate)?;
    validate_rate(
        "margins.default.payout_rate",
        config.margins.default.payout_rate,
    )?;
    for (service, entry) in &config.margins.service_types {
        validate_rate(&format!("margins.{service}.tax_rate"), entry.tax_rate)?;
        validate_rate(&format!("margins.{service}.payout_rate"), entry.payout_rate)?;
    }

    if config.cadence.max_per_cycle == 0 {
        return Err(ConfigError::Validation(
            "cadence.max_per_cycle must be at least 1".to_string(),
        ));
    }

    let ingest = &config.ingest;
    if !(1..=MAX_BATCH_SIZE).contains(&ingest.batch_size) {
        return Err(ConfigError::Validation(format!(
            "ingest.batch_size must be within 1..={MAX_BATCH_SIZE}, got {}",
            ingest.batch_size
        )));
    }
    if !(1..=MAX_ERROR_SAMPLES).contains(&ingest.error_sample_limit) {
        return Err(ConfigError::Validation(format!(
            "ingest.error_sample_limit must be within 1..={MAX_ERROR_SAMPLES}, got {}",
            ingest.error_sample_limit
        )));
    }
    if ingest.write_concurrency == 0 {
        return Err(ConfigError::Validation(
            "ingest.write_concurrency must be at least 1".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for source in &config.freshness.sources {
        if source.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "freshness source name must be non-empty".to_string(),
            ));
        }
        if !seen.insert(source.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate freshness source: '{}'",
                source.name
            )));
        }
        if source.kind == FreshnessSourceKind::Directory && source.path.is_none() {
            return Err(ConfigError::Validation(format!(
                "freshness source '{}' is a directory source without a path",
                source.name
            )));
        }
    }

    if config.proposals.site.site_slug.trim().is_empty() {
        return Err(ConfigError::Validation(
            "proposals.site.site_slug must be non-empty".to_string(),
        ));
    }

    Ok(())
}
