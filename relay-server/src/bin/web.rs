//! IdRelay Web Server.
//!
//! This binary:
//! - Receives provider webhooks and reconciles them into the in-memory store
//! - Proxies applicant and workflow run creation to the provider
//! - Serves merged run views combining live provider data and webhook data

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use idrelay::{router, AppState, Config, MemoryRunStore, ProviderClient, RunStore};

/// Interval between expired-record sweeps.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration; refuses to start without an API token
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        port = config.port,
        api_base = %config.api_base,
        api_version = %config.api_version,
        cors_origins = ?config.cors_origins,
        cors_trusted_domain = ?config.cors_trusted_domain,
        webhook_signing_configured = config.webhook_token.is_some(),
        store_capacity = config.store_capacity,
        store_ttl_secs = config.store_ttl_secs,
        merge_precedence = ?config.merge_precedence,
        "config_loaded"
    );

    let provider = ProviderClient::new(&config).context("Failed to build provider client")?;
    let store = Arc::new(MemoryRunStore::new(config.store_capacity, config.store_ttl()));

    if config.store_ttl().is_some() {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PRUNE_INTERVAL);
            loop {
                interval.tick().await;
                let pruned = store.prune_expired();
                if pruned > 0 {
                    info!(pruned = pruned, remaining = store.len(), "run_store_pruned");
                }
            }
        });
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::new(config, Arc::new(provider), store);
    let app = router(state);

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
