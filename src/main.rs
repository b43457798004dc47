// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity-Tally background service
//!
//! Keeps per-day activity counts, flushes them to a Google Sheets log on a
//! timer and serves the UI over a local HTTP API.

use activity_tally::{
    config::Config,
    db::LocalStore,
    services::{
        GoogleIdentity, IdentityProvider, SheetsClient, StaticIdentity, SyncScheduler,
        SyncService,
    },
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Activity-Tally service");

    // Open the local store
    let store = LocalStore::open(&config.data_path).await?;

    // Identity: a fixed token for development, otherwise the OAuth refresh flow
    let identity: Arc<dyn IdentityProvider> = match (
        config.google_access_token.clone(),
        config.google_user_email.clone(),
    ) {
        (Some(token), Some(email)) => {
            tracing::warn!("Using static Google credential");
            Arc::new(StaticIdentity::new(token, email))
        }
        _ => Arc::new(GoogleIdentity::new(
            config.google_client_id.clone().unwrap_or_default(),
            config.google_client_secret.clone().unwrap_or_default(),
            config.google_refresh_token.clone(),
        )),
    };

    let sheets = Arc::new(SheetsClient::new(
        config.spreadsheet_id.clone(),
        identity.clone(),
    ));
    tracing::info!(spreadsheet = %config.spreadsheet_id, "Sheets client initialized");

    let sync = Arc::new(SyncService::new(&config, store, sheets, identity));
    let scheduler = SyncScheduler::new(sync.clone(), &config);

    // Resume the sync timer for a persisted session
    scheduler.restore().await?;
    if let Some(session) = sync.current_session().await {
        sync.start_session(&session).await;
    }

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        sync,
        scheduler,
    });

    // Build router
    let app = activity_tally::routes::create_router(state);

    // Start server
    let addr = format!("127.0.0.1:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
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
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("activity_tally=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
