//! Queueinator Daemon - Main Entry Point
//! Serves the queue browser session over JSON-RPC

mod config;
mod logging;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

// Import workspace crates
use config::DaemonConfig;
use queueinator_api_rpc::RpcServer;
use queueinator_core::application::session::constants::LOCAL_HOST_LABEL;
use queueinator_core::application::{shutdown_channel, BrowserSession, RefreshScheduler};
use queueinator_core::port::id_provider::UuidProvider;
use queueinator_core::port::time_provider::SystemTimeProvider;
use queueinator_core::port::CatalogSource;
use queueinator_core::VERSION;
use queueinator_infra_sqlite::{create_pool, run_migrations, SqliteCatalog};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration and initialize logging
    let config = DaemonConfig::from_env()?;
    let _log_guard = logging::init(&config)?;

    info!(version = VERSION, "Queueinator daemon starting...");

    // 2. Initialize database
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create {}", parent.display()))?;
    }
    info!(db_path = %config.db_path.display(), "Initializing database...");

    let pool = create_pool(&config.database_url())
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 3. Setup dependencies (DI wiring)
    let catalog: Arc<dyn CatalogSource> = Arc::new(SqliteCatalog::new(
        pool.clone(),
        LOCAL_HOST_LABEL,
        Arc::new(UuidProvider),
        Arc::new(SystemTimeProvider),
    ));
    let session = Arc::new(BrowserSession::new(catalog, config.browser.clone()));

    let tree = session.build_hierarchy().await;
    info!(
        host = %tree.display_label,
        messages = tree.message_count,
        "Initial hierarchy built"
    );

    // 4. Start JSON-RPC server
    let rpc_server = RpcServer::new(config.rpc.clone(), session.clone());
    let (rpc_addr, rpc_handle) = rpc_server
        .start()
        .await
        .context("RPC server start failed")?;

    // 5. Start periodic refresh (optional)
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let refresh_handle = match RefreshScheduler::from_config(session.clone()) {
        Some(scheduler) => Some(tokio::spawn(scheduler.run(shutdown_rx))),
        None => {
            info!("Periodic refresh disabled");
            None
        }
    };

    info!(addr = %rpc_addr, "System ready. Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 7. Graceful shutdown
    shutdown_tx.shutdown();
    session.shutdown();
    if let Err(e) = rpc_handle.stop() {
        error!(error = %e, "RPC server already stopped");
    }
    rpc_handle.stopped().await;
    if let Some(handle) = refresh_handle {
        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await;
    }
    pool.close().await;

    info!("Shutdown complete.");
    Ok(())
}
