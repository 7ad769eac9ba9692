//! feedback-live push hub entry point.
//!
//! Starts the Axum HTTP server with the REST and WebSocket endpoints.

use feedback_live::api;
use feedback_live::app_state::AppState;
use feedback_live::config::HubConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = HubConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting feedback-live hub");
    if config.tokens.is_empty() {
        tracing::warn!("HUB_TOKENS is empty: every websocket upgrade will be rejected");
    }

    let app = api::build_app(AppState::from_config(&config));

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;

    tracing::info!("server stopped");
    Ok(())
}
