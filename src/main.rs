// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Marquee sync bridge
//!
//! Runs the favorites/session sync core next to the app's UI shell and
//! exposes it over a small local HTTP API.

use marquee_sync::{
    config::Config,
    db::{FirestoreRemote, LocalStore, MemoryRemote, SharedRemote, TimeoutRemote},
    services::EncryptionService,
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long shutdown waits for the final logout to reach the remote.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Marquee sync bridge");

    // Local store and device key
    let local = Arc::new(LocalStore::open(&config.db_path).expect("Failed to open local store"));
    tracing::info!(path = %config.db_path, "Local store ready");

    let crypto =
        EncryptionService::load_or_create(&config.key_path).expect("Failed to load device key");

    // Remote store
    let remote: SharedRemote = match &config.gcp_project_id {
        Some(project_id) => Arc::new(
            FirestoreRemote::new(project_id)
                .await
                .expect("Failed to connect to Firestore"),
        ),
        None => {
            tracing::warn!("GCP_PROJECT_ID not set, using in-memory remote store");
            Arc::new(MemoryRemote::new())
        }
    };
    let remote: SharedRemote = Arc::new(TimeoutRemote::new(remote, config.remote_timeout));

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), local, remote, crypto));

    // Build router
    let app = marquee_sync::routes::create_router(state.clone());

    // Start server
    let addr = format!("127.0.0.1:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Process is going away: close the open session if there is one
    match state.lifecycle.shutdown() {
        Ok(Some(task)) => {
            if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
                tracing::warn!("Final logout did not reach the remote store in time");
            }
        }
        Ok(None) => {}
        Err(e) => tracing::error!(error = %e, "Failed to record logout on shutdown"),
    }

    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
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
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("marquee_sync=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
