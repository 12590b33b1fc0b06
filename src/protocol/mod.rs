//! Protocol types for MCP and JSON-RPC communication
//!
//! This module contains all protocol-related types and traits.

mod frame;
mod jsonrpc;
mod mcp;

pub use frame::{Frame, InboundFrame, OutboundFrame};
pub use jsonrpc::{codes, ErrorObject, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use mcp::{McpTool, ServerInfo, Tool, ToolError, PROTOCOL_VERSION};
