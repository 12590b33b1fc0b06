//! Enrich MCP Server
//!
//! A tool server speaking the Model Context Protocol over resumable
//! streaming HTTP. Every result a session produces is appended to a bounded
//! per-stream event log, so a client that loses its connection can reattach
//! with the last event id it saw and receive exactly what it missed.
//!
//! # Features
//!
//! - **Resumable streams**: replay after `Last-Event-ID`, explicit truncation signal
//! - **Session lifecycle**: connecting, active, draining, closed with idle reaping
//! - **Tool dispatch**: schema-validated arguments, uniform `CallResult` envelope
//! - **External enrichment**: HTTP collaborator with timeout and error mapping
//!
//! # Modules
//!
//! - `types`: Core data structures (Event, Session, CallResult)
//! - `event_store`: Bounded per-stream event log with replay
//! - `session`: Session registry, state machine and reaper
//! - `protocol`: JSON-RPC, MCP and transport frame types
//! - `validation`: JSON Schema argument validation
//! - `collaborator`: Outbound HTTP service used by tools
//! - `tools`: Tool dispatcher and tool implementations
//! - `transport`: Maps inbound frames onto registry and dispatcher
//! - `api`: axum router, SSE responses and handlers
//! - `config`: Environment configuration
//! - `utils`: Logging setup
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use enrich_mcp::api::{create_router, AppState};
//! use enrich_mcp::collaborator::{HttpService, ServiceConfig};
//! use enrich_mcp::config::ServerConfig;
//! use enrich_mcp::protocol::ServerInfo;
//! use enrich_mcp::tools::{register_all_tools, ToolDispatcher};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let config = ServerConfig::default();
//! let server = ServerInfo::default();
//! let service = Arc::new(HttpService::new(ServiceConfig::default())?);
//!
//! let mut dispatcher = ToolDispatcher::new();
//! register_all_tools(&mut dispatcher, &server, service)?;
//!
//! let state = Arc::new(AppState::from_config(&config, server, dispatcher));
//! let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
//! axum::serve(listener, create_router(state)).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod collaborator;
pub mod config;
pub mod event_store;
pub mod protocol;
pub mod session;
pub mod tools;
pub mod transport;
pub mod types;
pub mod utils;
pub mod validation;

// Re-export commonly used items at crate root
pub use config::{ConfigError, ServerConfig};
pub use event_store::EventLog;
pub use protocol::{McpTool, ServerInfo, Tool};
pub use session::SessionRegistry;
pub use tools::ToolDispatcher;
pub use transport::TransportAdapter;
pub use types::{CallResult, ConnectionState, Event, EventId, ServerResult, Session};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
