use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use mcp_github_sse::config::{Cli, Config};
use mcp_github_sse::dispatcher::Dispatcher;
use mcp_github_sse::github::OctocrabClient;
use mcp_github_sse::http::{router, AppState};
use mcp_github_sse::session::SessionManager;
use mcp_github_sse::tools::{github_tools, ToolContext};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env(cli)?;
    info!(?config, "Configuration loaded");

    let github = OctocrabClient::with_token(&config.token)
        .map_err(|e| anyhow::anyhow!("Failed to create GitHub client: {}", e))?;
    let ctx = ToolContext::new(
        Arc::new(github),
        config.default_owner.clone(),
        config.max_results,
    );
    let registry = github_tools(ctx)?;
    info!(tools = registry.len(), "Tool registry built");

    let sessions = SessionManager::new(config.keep_alive);
    let app = router(AppState::new(
        sessions.clone(),
        Dispatcher::new(Arc::new(registry)),
    ));

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, "Server listening");

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        info!("Received Ctrl+C, shutting down gracefully...");
        // Open SSE streams would otherwise hold the server up indefinitely.
        sessions.close_all();
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server stopped");
    Ok(())
}
