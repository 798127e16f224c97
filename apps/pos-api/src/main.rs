//! # Bistro POS API Server
//!
//! Loads configuration, opens the store, starts the hub and the receipt
//! worker, then serves HTTP and WebSocket traffic until Ctrl+C or SIGTERM.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bistro_db::Database;
use bistro_hub::Hub;
use bistro_pos_api::services::OutboundQueue;
use bistro_pos_api::{build_app, AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,bistro=debug")),
        )
        .with_target(true)
        .init();

    info!("Starting Bistro POS API...");

    let config = AppConfig::load(None).context("Failed to load configuration")?;
    info!(
        bind = %config.bind_address(),
        database = %config.database.path.display(),
        "Configuration loaded"
    );

    let db = Database::new(config.db_config())
        .await
        .context("Failed to open database")?;
    info!("Database ready");

    let hub = Arc::new(Hub::new(config.hub.clone()));
    let (outbound, _worker) = OutboundQueue::start(&config.outbound);

    let state = AppState::new(&config, db.clone(), hub, outbound);
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address()))?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
