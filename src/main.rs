// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Schwab-Tracker API Server
//!
//! Authorizes against Schwab, stores the tokens encrypted, and keeps them
//! fresh in the background.

use schwab_tracker::{
    config::{Config, StoreBackend},
    db::CredentialDb,
    services::{SchwabAuthService, TokenRefreshScheduler},
    AppState,
};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Schwab-Tracker API");

    // Open the credential store
    let db = match config.store_backend {
        StoreBackend::Firestore => CredentialDb::new(&config.gcp_project_id).await?,
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory credential store; tokens are lost on restart");
            CredentialDb::new_in_memory()
        }
    };

    // Initialize Schwab auth service
    let auth = Arc::new(SchwabAuthService::from_config(&config, db.clone())?);
    tracing::info!(
        base_url = %config.schwab_oauth_base_url,
        "Schwab auth service initialized"
    );

    // Start the background freshness check
    let shutdown = CancellationToken::new();
    let scheduler = TokenRefreshScheduler::new(auth.clone()).spawn(shutdown.clone());

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        auth,
    });

    // Build router
    let app = schwab_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    if let Err(e) = scheduler.await {
        tracing::error!(error = %e, "Token refresh scheduler task failed");
    }

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("schwab_tracker=debug,info")),
        )
        .with(format)
        .init();
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }
}
