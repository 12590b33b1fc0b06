//! Enrich MCP Server - Binary Entry Point
//!
//! This is the main entry point for the enrich-server binary.

use std::sync::Arc;

use enrich_mcp::api::{create_router, AppState};
use enrich_mcp::collaborator::HttpService;
use enrich_mcp::config::ServerConfig;
use enrich_mcp::protocol::ServerInfo;
use enrich_mcp::session::spawn_reaper;
use enrich_mcp::tools::{register_all_tools, ToolDispatcher};
use enrich_mcp::types::ServerResult;
use enrich_mcp::utils::init_tracing;

#[tokio::main]
async fn main() -> ServerResult<()> {
    let config = ServerConfig::from_env()?;
    init_tracing(&config.log_level);

    let server = ServerInfo::default();
    if config.service.url.is_none() {
        tracing::warn!("ENRICH_API_URL is not set; contact_enrich calls will fail");
    }
    let service = Arc::new(HttpService::new(config.service.clone())?);

    let mut dispatcher = ToolDispatcher::new();
    register_all_tools(&mut dispatcher, &server, service)?;

    let state = Arc::new(AppState::from_config(&config, server, dispatcher));
    let reaper = spawn_reaper(state.registry().clone(), config.reaper_interval);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        tools = state.adapter.dispatcher().len(),
        max_events_per_stream = config.max_events_per_stream,
        "enrich-server listening"
    );

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    reaper.abort();
    Ok(())
}
