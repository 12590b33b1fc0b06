//! Shared application state for the HTTP transport

use std::sync::Arc;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::event_store::EventLog;
use crate::protocol::ServerInfo;
use crate::session::{RegistryConfig, SessionRegistry};
use crate::tools::ToolDispatcher;
use crate::transport::TransportAdapter;

/// State handed to every axum handler
pub struct AppState {
    pub adapter: Arc<TransportAdapter>,
    /// Interval of SSE keep-alive comments on open connections
    pub keep_alive: Duration,
}

impl AppState {
    /// Wire event log, registry and adapter from the server configuration
    pub fn from_config(
        config: &ServerConfig,
        server: ServerInfo,
        dispatcher: ToolDispatcher,
    ) -> Self {
        let log = Arc::new(EventLog::with_capacity(config.max_events_per_stream));
        let registry = Arc::new(SessionRegistry::with_config(
            log,
            RegistryConfig {
                idle_timeout: config.idle_timeout,
                drain_grace: config.drain_grace,
                live_buffer: config.live_buffer,
            },
        ));
        let adapter = Arc::new(TransportAdapter::new(
            registry,
            Arc::new(dispatcher),
            server,
        ));

        Self {
            adapter,
            keep_alive: config.keep_alive,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        self.adapter.registry()
    }
}
