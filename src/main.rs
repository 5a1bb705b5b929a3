mod api;
mod config;
mod db;
mod error;
mod realtime;
mod scrape;
mod sweep;
mod types;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::routes::{router, ApiState};
use crate::config::{Config, RunMode, StoreBackend, STORE_HTTP_TIMEOUT_SECS};
use crate::db::{HistoryStore, RestStore, SqliteStore};
use crate::error::{AppError, Result};
use crate::realtime::SubscriptionManager;
use crate::scrape::HttpPageFetcher;
use crate::sweep::{JobDispatcher, JobProcessor};

#[tokio::main]
async fn main() {
    // A missing .env is normal in deployed environments.
    let _ = dotenvy::dotenv();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Store ---
    let store: Arc<dyn HistoryStore> = match &cfg.store {
        StoreBackend::Rest { base_url, key } => Arc::new(RestStore::new(
            base_url,
            key,
            Duration::from_secs(STORE_HTTP_TIMEOUT_SECS),
        )?),
        StoreBackend::Sqlite { url } => Arc::new(SqliteStore::connect(url).await?),
    };

    // --- Engine ---
    let fetcher = Arc::new(HttpPageFetcher::new(Duration::from_secs(cfg.scrape_timeout_secs))?);
    let processor = Arc::new(JobProcessor::new(fetcher, Arc::clone(&store), cfg.page_fan_out));
    info!(
        mode = ?cfg.run_mode,
        pages = cfg.page_fan_out,
        "Sweeper starting with {} page(s) per window",
        cfg.page_fan_out,
    );

    match cfg.run_mode {
        RunMode::Batch => run_batch(store, processor).await,
        RunMode::Live => run_live(cfg, processor).await,
    }
}

/// Process the most recent job once and return.
async fn run_batch(store: Arc<dyn HistoryStore>, processor: Arc<JobProcessor>) -> Result<()> {
    let Some(job) = store.select_latest_job().await? else {
        warn!("No jobs found, nothing to do");
        return Ok(());
    };
    processor.process(&job).await;
    Ok(())
}

/// Subscribe to job inserts and process each one as it arrives. Runs until killed.
async fn run_live(cfg: Config, processor: Arc<JobProcessor>) -> Result<()> {
    let realtime_url = cfg
        .realtime_url
        .clone()
        .ok_or_else(|| AppError::Config("live mode needs a realtime URL".to_string()))?;
    let access_token = match &cfg.store {
        StoreBackend::Rest { key, .. } => key.clone(),
        StoreBackend::Sqlite { .. } => String::new(),
    };

    let health = Arc::new(HealthState::new());
    let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();

    // Realtime subscription (reconnects forever)
    let manager = SubscriptionManager::new(realtime_url, access_token, jobs_tx, Arc::clone(&health));
    tokio::spawn(async move { manager.run().await });

    // One task per received job
    let dispatcher = JobDispatcher::new(processor, Arc::clone(&health));
    tokio::spawn(async move { dispatcher.run(jobs_rx).await });

    // Health endpoint
    let app = router(ApiState { health });
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Health endpoint listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
