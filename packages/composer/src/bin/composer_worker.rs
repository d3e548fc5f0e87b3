//! Composer Worker
//!
//! Runs a batch of personalization jobs through the local substrate and
//! prints the batch result as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use composer_core::config::Config;
use composer_core::domains::personalization::activities::ORCHESTRATOR_CONFIG_RESOURCE;
use composer_core::domains::personalization::{BatchRequest, JobOrchestrator};
use composer_core::kernel::substrate::{LocalSubstrate, WorkerOptions};
use composer_core::kernel::{
    ConfigProvider, FileConfigProvider, OpenAIClient, PostgresContentStore, ServerDeps,
    SimpleScraper,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "composer_worker")]
#[command(about = "Batch ad-content personalization worker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Personalize every job in a batch file
    Run {
        /// JSON file: an array of jobs or {"jobs": [...]}
        #[arg(long)]
        batch: PathBuf,

        /// Pretty-print the result
        #[arg(long)]
        pretty: bool,
    },

    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,composer_core=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate => {
            let _ = dotenvy::dotenv();
            let database_url =
                std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
            let pool = connect(&database_url).await?;
            migrate(&pool).await?;
        }
        Commands::Run { batch, pretty } => run(batch, pretty).await?,
    }

    Ok(())
}

async fn connect(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("Failed to connect to database")
}

async fn migrate(pool: &PgPool) -> Result<()> {
    tracing::info!("Running database migrations");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");
    Ok(())
}

async fn run(batch_path: PathBuf, pretty: bool) -> Result<()> {
    let config = Config::from_env()?;

    let raw = tokio::fs::read_to_string(&batch_path)
        .await
        .with_context(|| format!("Failed to read batch file {}", batch_path.display()))?;
    let jobs = serde_json::from_str::<BatchRequest>(&raw)
        .with_context(|| format!("Invalid batch file {}", batch_path.display()))?
        .into_jobs();

    let pool = connect(&config.database_url).await?;
    if config.run_migrations {
        migrate(&pool).await?;
    }

    let config_provider = Arc::new(FileConfigProvider::new(config.config_dir.clone()));

    // Worker throttles come from the orchestrator resource. The orchestrator
    // loads it again through the substrate and fails the batch if it is bad.
    let worker_options = match config_provider.load(ORCHESTRATOR_CONFIG_RESOURCE).await {
        Ok(workflow_config) => WorkerOptions::from_config(&workflow_config),
        Err(e) => {
            tracing::warn!(error = %e, "Using default worker throttles");
            WorkerOptions::default()
        }
    };
    tracing::info!(
        max_concurrent_activities = worker_options.max_concurrent_activities,
        max_concurrent_workflows = worker_options.max_concurrent_workflows,
        jobs = jobs.len(),
        "Starting composer worker"
    );

    let deps = ServerDeps::new(
        Arc::new(PostgresContentStore::new(pool)),
        Arc::new(OpenAIClient::new(&config.openai_api_key)),
        Arc::new(SimpleScraper::new()?),
        config_provider,
    );
    let substrate = Arc::new(LocalSubstrate::new(worker_options));
    let orchestrator = JobOrchestrator::new(substrate, deps);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; cancelling outstanding pipelines");
            on_signal.cancel();
        }
    });

    let results = orchestrator
        .run_batch_with_cancellation(jobs, cancel)
        .await
        .context("Batch personalization failed")?;

    let output = if pretty {
        serde_json::to_string_pretty(&results)?
    } else {
        serde_json::to_string(&results)?
    };
    println!("{}", output);

    Ok(())
}
