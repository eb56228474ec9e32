//! # Tracker Service
//!
//! Runs the status poller against the PostgreSQL tracking store, publishing
//! notifications through `pg_notify`.
//!
//! ## Usage
//!
//! ```bash
//! # ./config/tracker.toml plus TRACKER__* overrides
//! DATABASE_URL=postgresql://localhost/tracker tracker-service
//!
//! # explicit configuration file
//! tracker-service /etc/tracker/tracker.toml
//! ```

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use lifecycle_tracker::config::ConfigManager;
use lifecycle_tracker::logging;
use lifecycle_tracker::messaging::PgNotifyBus;
use lifecycle_tracker::orchestration::{NotificationDispatcher, StatusPoller};
use lifecycle_tracker::processor::HttpProcessorClient;
use lifecycle_tracker::state_machine::StatusVocabulary;
use lifecycle_tracker::store::PgTrackingStore;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %logging::get_environment(),
        "Starting tracker service"
    );

    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("TRACKER_CONFIG").map(PathBuf::from));
    let manager = match config_path {
        Some(path) => ConfigManager::load_from_file(&path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ConfigManager::load().context("loading configuration")?,
    };
    let config = manager.config();

    let database_url = config
        .database
        .database_url()
        .context("no database URL: set database.url or DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&database_url)
        .await
        .context("connecting to PostgreSQL")?;

    let store = PgTrackingStore::new(pool.clone());
    if config.database.run_migrations {
        store.migrate().await.context("running migrations")?;
        info!("Tracking schema migrations applied");
    }

    let processor = HttpProcessorClient::new(config.processor.clone())
        .context("building processor client")?;
    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::new(PgNotifyBus::new(pool)),
        config.notifications.clone(),
    ));

    let poller = Arc::new(StatusPoller::new(
        Arc::new(store),
        Arc::new(processor),
        dispatcher,
        StatusVocabulary::from_config(&config.vocabulary),
        config.poller.clone(),
    ));
    poller.start().context("starting status poller")?;

    info!(poller_id = %poller.poller_id(), "Tracker service running; press Ctrl+C to stop");

    shutdown_signal().await;

    info!("Shutdown signal received, stopping status poller");
    poller.stop().await;
    info!("Tracker service stopped");

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
