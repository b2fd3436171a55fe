mod context;
mod imports;
mod pipeline;
mod topics;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::context::Context;

#[derive(Debug, Parser)]
#[command(name = "seoflow-cli")]
#[command(about = "seoflow content pipeline command line interface")]
struct Cli {
    /// Identity recorded on imports, approvals, and run audits
    #[arg(long, global = true, env = "SEOFLOW_OPERATOR", default_value = "system")]
    operator: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Load booking and ad-spend feeds
    Import {
        #[command(subcommand)]
        command: ImportCommands,
    },
    /// Profit rollups
    Metrics {
        #[command(subcommand)]
        command: MetricsCommands,
    },
    /// Topic proposals and the draft lifecycle
    Topics {
        #[command(subcommand)]
        command: TopicsCommands,
    },
    /// Quality gate
    Gate {
        #[command(subcommand)]
        command: GateCommands,
    },
    /// Promote ready topics, subject to freshness and cadence
    Publish {
        #[arg(long)]
        org: String,
        /// Capped by the configured cadence
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show upstream data freshness
    Freshness {
        #[arg(long)]
        org: String,
        /// Store the result as a snapshot
        #[arg(long)]
        record: bool,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    Migrate,
    Ping,
}

#[derive(Debug, Subcommand)]
enum ImportCommands {
    /// Import a booking CSV
    Bookings {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        org: String,
        #[arg(long)]
        label: String,
        /// Replace bookings whose trip id already exists
        #[arg(long)]
        allow_overwrite: bool,
    },
    /// Import an ad-spend CSV. Existing rows are always merged.
    Ads {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        org: String,
        #[arg(long)]
        label: String,
    },
    /// Delete every record an import wrote
    Rollback { import_id: Uuid },
    /// Recent imports, newest first
    List {
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

#[derive(Debug, Subcommand)]
enum MetricsCommands {
    /// Recompute and store rollups for a date range
    Compute {
        #[arg(long)]
        org: String,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Stored segment figures
    Segments {
        #[arg(long)]
        org: String,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long, default_value = "city")]
        segment_type: String,
    },
}

#[derive(Debug, Subcommand)]
enum TopicsCommands {
    /// Propose topics from recent profit data
    Propose {
        #[arg(long)]
        org: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    List {
        #[arg(long)]
        org: String,
        #[arg(long)]
        status: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Generate and evaluate a draft
    Generate { topic_id: Uuid },
    Approve { topic_id: Uuid },
    Reject {
        topic_id: Uuid,
        #[arg(long)]
        reason: String,
    },
}

#[derive(Debug, Subcommand)]
enum GateCommands {
    /// Re-evaluate every draft and ready topic
    Run {
        #[arg(long)]
        org: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("seoflow-cli: no command given; run with --help");
        return Ok(());
    };

    let config = seoflow_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match command {
        Commands::Db { command } => run_db(&config, &command).await,
        command => {
            let ctx = Context::connect(&config, &cli.operator).await?;
            dispatch(&ctx, command).await
        }
    }
}

async fn dispatch(ctx: &Context, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Db { .. } => anyhow::bail!("db commands run without a pipeline context"),
        Commands::Import { command } => run_import(ctx, command).await,
        Commands::Metrics { command } => match command {
            MetricsCommands::Compute { org, from, to } => {
                pipeline::run_metrics_compute(ctx, &org, from, to).await
            }
            MetricsCommands::Segments {
                org,
                from,
                to,
                segment_type,
            } => pipeline::run_metrics_segments(ctx, &org, from, to, &segment_type).await,
        },
        Commands::Topics { command } => run_topics(ctx, command).await,
        Commands::Gate {
            command: GateCommands::Run { org },
        } => pipeline::run_gate(ctx, &org).await,
        Commands::Publish { org, limit } => pipeline::run_publish(ctx, &org, limit).await,
        Commands::Freshness { org, record } => pipeline::run_freshness(ctx, &org, record).await,
    }
}

async fn run_db(config: &seoflow_core::AppConfig, command: &DbCommands) -> anyhow::Result<()> {
    let pool_config = seoflow_db::PoolConfig::from_app_config(config);
    let pool = seoflow_db::connect_pool(&config.database_url, pool_config).await?;
    match command {
        DbCommands::Migrate => {
            let applied = seoflow_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        DbCommands::Ping => {
            seoflow_db::ping(&pool).await?;
            println!("database ok");
        }
    }
    Ok(())
}

async fn run_import(ctx: &Context, command: ImportCommands) -> anyhow::Result<()> {
    match command {
        ImportCommands::Bookings {
            file,
            org,
            label,
            allow_overwrite,
        } => imports::run_import_bookings(ctx, &file, &org, &label, allow_overwrite).await,
        ImportCommands::Ads { file, org, label } => {
            imports::run_import_ads(ctx, &file, &org, &label).await
        }
        ImportCommands::Rollback { import_id } => imports::run_rollback(ctx, import_id).await,
        ImportCommands::List { limit } => imports::run_list(ctx, limit).await,
    }
}

async fn run_topics(ctx: &Context, command: TopicsCommands) -> anyhow::Result<()> {
    match command {
        TopicsCommands::Propose { org, limit } => topics::run_propose(ctx, &org, limit).await,
        TopicsCommands::List { org, status, json } => {
            topics::run_list(ctx, &org, status.as_deref(), json).await
        }
        TopicsCommands::Generate { topic_id } => topics::run_generate(ctx, topic_id).await,
        TopicsCommands::Approve { topic_id } => topics::run_approve(ctx, topic_id).await,
        TopicsCommands::Reject { topic_id, reason } => {
            topics::run_reject(ctx, topic_id, &reason).await
        }
    }
}
