//! Lotus Server
//!
//! A multi-port backend emulating a legacy online game's login and shard
//! services: HTTP login and shard directory on one port, the Custom1 binary
//! login protocol on three, and the Custom2 stub on one more.

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use lotus_server::config::ServerConfig;
use lotus_server::net::dispatcher::Dispatcher;
use lotus_server::state::AppState;
use lotus_server::VERSION;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Lotus Server v{} starting", VERSION);

    // Load configuration
    let config = ServerConfig::load().await?;
    info!(
        "Configuration loaded from: {}",
        config.config_path.display()
    );

    // Create shutdown channel
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Load keys, open the credential store, build shared state
    let state = Arc::new(AppState::init(config, shutdown_tx.clone()).await?);
    info!("Application state initialized");

    // Bind every listener up front; a port we cannot claim is fatal
    let dispatcher = Dispatcher::bind(state.clone()).await?;
    let handles = dispatcher.run();

    info!("Server startup complete!");

    // Wait for shutdown signal
    wait_for_shutdown(shutdown_tx).await;

    info!("Shutting down server...");

    // Wait for acceptors to finish
    for handle in handles {
        let _ = handle.await;
    }

    // Cleanup
    state.connections.clear();
    state.sessions.clear();
    info!("Server shutdown complete. Goodbye!");
    Ok(())
}

/// Initialize the logging/tracing system
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lotus_server=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .init();
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn wait_for_shutdown(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    // Signal all tasks to shut down
    let _ = shutdown_tx.send(());
}
