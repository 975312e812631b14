//! Weather feed ingester service.
//!
//! Fetches the upstream weather feed and replaces the local SQLite
//! snapshot, either once (`--once`, exit status reports the outcome) or as
//! a long-running service with a poll loop and an HTTP API.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use ingester::{run_ingestion, run_with_retry, start_server, RetryPolicy, RunTrigger, ServerState};
use ingestion::{IngestionConfig, IngestionPipeline, RunStatus};
use storage::WeatherStore;

const EXIT_PARTIAL: u8 = 2;
const EXIT_FAILURE: u8 = 1;

#[derive(Parser, Debug)]
#[command(name = "ingester")]
#[command(about = "Weather feed ingester with local snapshot store")]
struct Args {
    /// YAML configuration file (otherwise WEATHER_* environment variables)
    #[arg(short, long, env = "WEATHER_CONFIG")]
    config: Option<PathBuf>,

    /// Run ingestion once and exit (0 complete, 2 partial, 1 failed)
    #[arg(long)]
    once: bool,

    /// Drop and recreate the weather table before starting (deletes stored data)
    #[arg(long)]
    reinit_db: bool,

    /// Port for the HTTP API
    #[arg(long, env = "INGESTER_PORT", default_value = "8082")]
    port: u16,

    /// Seconds between scheduled runs (0 disables polling)
    #[arg(long, env = "WEATHER_POLL_INTERVAL_SECS", default_value = "0")]
    poll_interval_secs: u64,

    /// Retries after a transport failure
    #[arg(long, env = "WEATHER_MAX_RETRIES", default_value = "3")]
    max_retries: u32,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .init();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Ingester failed");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = match &args.config {
        Some(path) => IngestionConfig::from_yaml(path)?,
        None => IngestionConfig::from_env()?,
    };
    info!(config = ?config, "Loaded configuration");

    if args.reinit_db {
        let store = WeatherStore::open(&config.db_path, config.mode).await?;
        warn!(path = %config.db_path.display(), "Reinitializing database; stored records are deleted");
        store.reinitialize().await?;
        store.close().await;
    }

    let pipeline = IngestionPipeline::from_config(&config).await?;
    let retry = RetryPolicy::with_max_retries(args.max_retries);

    if args.once {
        return Ok(run_once(&pipeline, &retry).await);
    }

    // Initialize Prometheus metrics exporter
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    let state = Arc::new(ServerState::new(pipeline, retry).with_metrics(prometheus_handle));

    if args.poll_interval_secs > 0 {
        let poll_state = state.clone();
        let period = Duration::from_secs(args.poll_interval_secs);
        info!(interval_secs = args.poll_interval_secs, "Starting scheduled ingestion");

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                // Failures are logged and tracked by run_ingestion.
                let _ = run_ingestion(&poll_state, RunTrigger::Scheduled).await;
            }
        });
    }

    start_server(state, args.port).await?;
    Ok(ExitCode::SUCCESS)
}

async fn run_once(pipeline: &IngestionPipeline, retry: &RetryPolicy) -> ExitCode {
    info!("Running single ingestion cycle");

    match run_with_retry(pipeline, retry).await {
        Ok(result) => {
            info!(
                records_written = result.records_written,
                locations_seen = result.locations_seen,
                locations_skipped = result.locations_skipped,
                duplicates_dropped = result.duplicates_dropped,
                shape = %result.shape,
                status = result.status().as_str(),
                "Ingestion finished"
            );
            match result.status() {
                RunStatus::Complete => ExitCode::SUCCESS,
                RunStatus::Partial => ExitCode::from(EXIT_PARTIAL),
            }
        }
        Err(e) => {
            error!(
                kind = e.kind(),
                error = %e,
                excerpt = e.excerpt().unwrap_or(""),
                "Ingestion failed; stored data left unchanged"
            );
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
