//! Aether Chat Server Library
//!
//! Presence tracking, channel routing and message fan-out for group and
//! private chat over WebSockets.

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod models;
pub mod protocol;
pub mod routing;
pub mod session;
pub mod store;
pub mod upload;

use anyhow::Context;
use axum::extract::State;
use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{AppState, ServerConfig};
use handlers::ws_handler;

/// Install the fmt subscriber; a no-op if one is already set
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
        // Already set, ignore
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    info!("=== Aether Chat Server ===");

    let config = ServerConfig::default();
    let addr = config.bind_addr;
    info!("Data directory: {:?}", config.data_dir);
    info!("Storage backend: {:?}", config.storage);

    let state = AppState::build(config).await?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {}", addr))?;
    info!("Listening on ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

async fn health_check(State(state): State<AppState>) -> String {
    format!(
        "OK - Aether Chat Server ({} online)",
        state.registry.online_count()
    )
}
