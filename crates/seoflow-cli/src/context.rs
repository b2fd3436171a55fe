//! Engines wired over the Postgres store for a single CLI invocation.

use std::sync::Arc;
use std::time::Duration;

use seoflow_content::{
    DraftGenerator, FreshnessMonitor, HttpDraftGenerator, PublishScheduler, TopicManager,
    UnconfiguredGenerator,
};
use seoflow_core::{AppConfig, Caller, Role};
use seoflow_db::{PgStore, PipelineStore};
use seoflow_ingest::IngestionEngine;
use seoflow_metrics::{attribution_for, MetricsEngine};

pub(crate) struct Context {
    pub ingest: IngestionEngine,
    pub metrics: MetricsEngine,
    pub topics: TopicManager,
    pub freshness: FreshnessMonitor,
    pub publisher: PublishScheduler,
    /// The CLI acts with owner rights under the operator's name.
    pub caller: Caller,
}

impl Context {
    /// Loads the pipeline config, connects to the database, and applies
    /// pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline config is invalid, the database is
    /// unreachable, a migration fails, or the generator client cannot be built.
    pub(crate) async fn connect(config: &AppConfig, operator: &str) -> anyhow::Result<Self> {
        let pipeline = seoflow_core::load_pipeline_config(&config.pipeline_config_path)?;

        let pool_config = seoflow_db::PoolConfig::from_app_config(config);
        let pool = seoflow_db::connect_pool(&config.database_url, pool_config).await?;
        seoflow_db::run_migrations(&pool).await?;
        let store: Arc<dyn PipelineStore> = Arc::new(PgStore::new(pool));

        let ingest = IngestionEngine::new(Arc::clone(&store), pipeline.ingest);
        let metrics = MetricsEngine::new(Arc::clone(&store), pipeline.margins.clone())
            .with_attribution(attribution_for(pipeline.metrics.attribution))
            .with_attribution_timeout(Duration::from_secs(config.attribution_timeout_secs));
        let topics = TopicManager::new(
            Arc::clone(&store),
            metrics.clone(),
            pipeline.proposals.clone(),
            pipeline.gate.clone(),
        )
        .with_generator(build_generator(config)?)
        .with_generator_timeout(Duration::from_secs(config.generator_timeout_secs));
        let freshness = FreshnessMonitor::new(Arc::clone(&store), &pipeline.freshness);
        let publisher =
            PublishScheduler::new(Arc::clone(&store), freshness.clone(), pipeline.cadence);

        Ok(Self {
            ingest,
            metrics,
            topics,
            freshness,
            publisher,
            caller: Caller::new(operator, Role::Owner),
        })
    }
}

fn build_generator(config: &AppConfig) -> anyhow::Result<Arc<dyn DraftGenerator>> {
    let Some(url) = &config.generator_url else {
        return Ok(Arc::new(UnconfiguredGenerator));
    };
    let mut generator = HttpDraftGenerator::new(url, config.generator_timeout_secs)?
        .with_retry(config.generator_max_retries, 1_000);
    if let Some(key) = &config.generator_api_key {
        generator = generator.with_api_key(key.clone());
    }
    Ok(Arc::new(generator))
}
