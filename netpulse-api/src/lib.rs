// ---------------------------------------------------------------------------
// REST API server
// ---------------------------------------------------------------------------
//
// Request-domain front end over the discovery engine plus the device and
// credential stores. Handlers never block on scan I/O: discovery calls
// suspend on the control-plane reply, everything else is a quick store
// round-trip on this domain's own connection.

pub mod auth;
pub mod error;
mod response;
mod routes;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use state::AppState;

/// Configuration for the API server.
pub struct ApiConfig {
    pub listen_addr: SocketAddr,
}

/// Build the axum Router (useful for testing).
pub fn build_router(state: Arc<AppState>) -> axum::Router {
    routes::build_router(state)
}

/// Start the API server and block until shutdown (Ctrl+C).
pub async fn start_server(config: ApiConfig, state: Arc<AppState>) -> std::io::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("API server shut down");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    tracing::info!("shutdown signal received");
}
