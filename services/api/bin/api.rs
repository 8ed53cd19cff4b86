//! Main Entrypoint for the voicelink relay service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Building the realtime session factory and shared state.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use std::{net::SocketAddr, sync::Arc};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use voicelink_api::{
    config::Config, provider::RealtimeSessionFactory, router::create_router, state::AppState,
    telemetry::init_tracing,
};

/// Waits for `Ctrl+C`, then cancels every live relay session.
async fn shutdown_signal(sessions: CancellationToken) {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
    sessions.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    init_tracing(&config);
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Shared State ---
    let remote_factory = Arc::new(RealtimeSessionFactory::new(&config));
    let app_state = Arc::new(AppState::new(config.clone(), remote_factory));
    let shutdown = app_state.shutdown.clone();

    // --- 4. Create Router and Apply Middleware ---
    // Devices connect from anywhere; accept every origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        provider = ?config.provider,
        bind_address = %config.bind_address,
        device_sample_rate = config.device_sample_rate,
        remote_sample_rate = config.remote_sample_rate,
        audio_workers = config.audio_workers,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown))
    .await?;

    info!("Server has shut down.");
    Ok(())
}
