//! # FlowMetrics Main Entry Point
//!
//! Loads configuration, runs migrations, starts the background scheduler,
//! and serves the HTTP API until interrupted.

use std::sync::Arc;

use sea_orm_migration::MigratorTrait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use flowmetrics::config::ConfigLoader;
use flowmetrics::crypto::CryptoKey;
use flowmetrics::migration::Migrator;
use flowmetrics::query::MetricsCache;
use flowmetrics::scheduler::SyncScheduler;
use flowmetrics::server::{AppState, run_server};
use flowmetrics::{db, telemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from layered env files and variables
    let config = Arc::new(ConfigLoader::new().load()?);

    telemetry::init_tracing(&config)?;

    info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        info!(config = %redacted_json, "Effective configuration");
    }

    let db = Arc::new(db::init_pool(&config).await?);
    Migrator::up(db.as_ref(), None).await?;

    let crypto_key = match &config.crypto_key {
        Some(bytes) => Some(Arc::new(CryptoKey::new(bytes.clone())?)),
        None => {
            info!("No crypto key configured; tenant API keys will be stored in plaintext");
            None
        }
    };

    let cache = Arc::new(MetricsCache::new(&config.cache));

    let shutdown = CancellationToken::new();
    let scheduler = SyncScheduler::new(
        Arc::clone(&config),
        Arc::clone(&db),
        Arc::clone(&cache),
        crypto_key.clone(),
    );
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown.clone()));

    let state = AppState {
        db: db.as_ref().clone(),
        config: Arc::clone(&config),
        cache,
        crypto_key,
    };

    let server = run_server(state);
    tokio::pin!(server);

    let result = tokio::select! {
        result = &mut server => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received; shutting down");
            Ok(())
        }
    };

    shutdown.cancel();
    if let Err(err) = scheduler_handle.await {
        error!(error = ?err, "Scheduler task did not shut down cleanly");
    }

    result
}
