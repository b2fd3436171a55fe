mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use seoflow_content::{DraftGenerator, HttpDraftGenerator, UnconfiguredGenerator};
use seoflow_core::AppConfig;
use seoflow_db::{PgStore, PipelineStore};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState, Timeouts},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = seoflow_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pipeline = seoflow_core::load_pipeline_config(&config.pipeline_config_path)?;

    let pool_config = seoflow_db::PoolConfig::from_app_config(&config);
    let pool = seoflow_db::connect_pool(&config.database_url, pool_config).await?;
    seoflow_db::run_migrations(&pool).await?;
    let store: Arc<dyn PipelineStore> = Arc::new(PgStore::new(pool));

    let state = AppState::new(
        store,
        &pipeline,
        build_generator(&config)?,
        Timeouts::from_app_config(&config),
    );

    let _scheduler = if config.scheduler_enabled {
        Some(scheduler::build_scheduler(state.clone()).await?)
    } else {
        tracing::info!("scheduler disabled by SEOFLOW_SCHEDULER_ENABLED");
        None
    };

    let auth = AuthState::from_env(matches!(
        config.env,
        seoflow_core::Environment::Development
    ))?;
    let app = build_app(state, auth, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "seoflow server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn build_generator(config: &AppConfig) -> anyhow::Result<Arc<dyn DraftGenerator>> {
    let Some(url) = &config.generator_url else {
        tracing::warn!("SEOFLOW_GENERATOR_URL not set; draft generation is unavailable");
        return Ok(Arc::new(UnconfiguredGenerator));
    };
    let mut generator = HttpDraftGenerator::new(url, config.generator_timeout_secs)?
        .with_retry(config.generator_max_retries, 1_000);
    if let Some(key) = &config.generator_api_key {
        generator = generator.with_api_key(key.clone());
    }
    Ok(Arc::new(generator))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
