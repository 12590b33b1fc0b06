//! Data types for the streaming tool server
//!
//! This module contains the core data structures shared by the event log,
//! the session registry and the tool dispatcher.

mod call_result;
mod event;
mod session;

pub use call_result::CallResult;
pub use event::{Event, EventId};
pub use session::{ConnectionState, Session};

/// Result type for the server entry point
pub type ServerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;
