//! MCP (Model Context Protocol) types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Protocol revision advertised during the handshake
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// MCP Tool definition
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct McpTool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl McpTool {
    /// Create a new MCP tool definition
    pub fn new(name: String, description: String, input_schema: Value) -> Self {
        Self {
            name,
            description,
            input_schema,
        }
    }
}

/// Server information for MCP handshake
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: crate::NAME.to_string(),
            version: crate::VERSION.to_string(),
        }
    }
}

/// Failure reported by a tool handler
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// Arguments passed the schema but were refused downstream
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    /// The external collaborator reported a failure
    #[error("{0}")]
    Collaborator(String),
}

/// Trait for MCP tools
///
/// All tools must implement this trait to be registered with the dispatcher.
/// Handlers receive arguments already validated against `input_schema`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool definition for tools/list
    fn definition(&self) -> McpTool;

    /// Execute the tool with the given arguments
    async fn call(&self, arguments: Value) -> Result<Value, ToolError>;

    /// Get the tool name (convenience method)
    fn name(&self) -> String {
        self.definition().name
    }
}
