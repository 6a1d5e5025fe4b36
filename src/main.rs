// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Glass-Mirror API Server
//!
//! Connects users to the Mirror API and proxies a few timeline operations
//! on their behalf.

use glass_mirror::{
    config::Config,
    db::{FirestoreDb, MemoryTokenStore, TokenBackend},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;

    // Missing credentials are fatal here, never at request time
    let config = Config::from_env().map_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        e
    })?;
    tracing::info!(
        port = config.port,
        scopes = config.oauth.scopes().len(),
        "Starting Glass-Mirror API"
    );

    let store = match &config.gcp_project_id {
        Some(project_id) => TokenBackend::Firestore(FirestoreDb::new(project_id).await?),
        None => {
            tracing::warn!("GCP_PROJECT_ID not set, tokens are kept in memory only");
            TokenBackend::Memory(MemoryTokenStore::new())
        }
    };

    let state = Arc::new(AppState::new(config.clone(), store)?);
    let app = glass_mirror::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("glass_mirror=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
