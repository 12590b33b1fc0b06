//! API module for the HTTP transport
//!
//! This module exposes the transport adapter over streamable HTTP.

pub mod http;
pub mod mcp;
pub mod state;

pub use http::create_router;
pub use state::AppState;
