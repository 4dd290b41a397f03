//! Clinicore Server: Application entry point.

mod config;

use clinicore_db::{DbError, DbManager};
use clinicore_service::{ClinicService, LocalBlobStore};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

#[derive(Debug, thiserror::Error)]
enum ServerError {
    #[error("configuration: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("database: {0}")]
    Database(#[from] DbError),

    #[error("media root: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    dotenvy::dotenv().ok();
    let config = ServerConfig::load()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    info!("Starting Clinicore server...");

    if let Err(e) = run(config).await {
        error!(error = %e, "Clinicore server failed");
        return Err(e);
    }

    info!("Clinicore server stopped.");
    Ok(())
}

async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let manager = DbManager::open(&config.db).await?;

    tokio::fs::create_dir_all(&config.media_root).await?;
    info!(media_root = %config.media_root.display(), "Media root ready");

    let service = ClinicService::new(
        manager.store(),
        LocalBlobStore::new(&config.media_root),
        config.service,
    );
    info!(
        max_upload_bytes = service.config().max_upload_bytes,
        view_throttle_secs = service.config().view_throttle_secs,
        "Clinic service ready"
    );

    // Transports attach here; the service is held until shutdown.
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    Ok(())
}
