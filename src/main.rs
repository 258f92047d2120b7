// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Planbridge API Server
//!
//! Runs the Google Calendar/Tasks sync engine for the workspace product:
//! task push, calendar/task pull, and OAuth credential lifecycle.

use planbridge::{
    config::Config,
    db::FirestoreDb,
    services::{GoogleClient, SyncService, TokenCipher, TokenService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Planbridge API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Initialize token cipher (current + optional legacy key)
    let cipher = TokenCipher::new(
        config.token_key_current.clone(),
        config.token_key_legacy.clone(),
    )
    .expect("Failed to initialize token cipher");
    tracing::info!(
        legacy_key = config.token_key_legacy.is_some(),
        "Token cipher initialized"
    );

    // Initialize Google API client
    let google = GoogleClient::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
    )
    .expect("Failed to initialize Google client");

    // Initialize shared token cache and refresh lease table.
    // These are shared across all service instances within this process.
    let token_cache = Arc::new(dashmap::DashMap::new());
    let refresh_locks = Arc::new(dashmap::DashMap::new());
    tracing::info!("Token cache initialized");

    let token_service = TokenService::new(
        google.clone(),
        db.clone(),
        cipher.clone(),
        token_cache,
        refresh_locks,
        config.refresh_wait_ms,
    );

    let sync_service = SyncService::new(&config, google, token_service, db.clone(), cipher);

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        sync_service,
    });

    // Build router
    let app = planbridge::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("planbridge=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
