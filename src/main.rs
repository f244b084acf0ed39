//! cc-miner coordinator entry point.
//!
//! Starts the Axum HTTP server with the REST API and the worker,
//! observer and echo WebSocket endpoints.

use cc_miner::app_state::AppState;
use cc_miner::config::CoordinatorConfig;
use cc_miner::logging::init_tracing;
use cc_miner::server::build_app;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = CoordinatorConfig::from_env()?;
    init_tracing(config.log);
    tracing::info!(addr = %config.listen_addr, "starting coordinator");

    // Build domain and service layers
    let app_state = AppState::new(&config);
    let app = build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
