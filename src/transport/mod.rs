//! Transport adapter for resumable tool sessions
//!
//! - `TransportAdapter`: frame handling on top of registry and dispatcher
//! - `Connection`: the outbound frame stream of one client connection

mod adapter;
mod connection;

pub use adapter::{tool_result_payload, ProtocolError, Reply, TransportAdapter};
pub use connection::Connection;
