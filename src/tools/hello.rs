//! Hello tool

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::protocol::{McpTool, ServerInfo, Tool, ToolError};

/// Simple liveness tool answering with a greeting
pub struct HelloTool {
    server_name: String,
}

impl HelloTool {
    pub fn new(server: &ServerInfo) -> Self {
        Self {
            server_name: server.name.clone(),
        }
    }
}

#[async_trait]
impl Tool for HelloTool {
    fn definition(&self) -> McpTool {
        McpTool::new(
            "hello".to_string(),
            "Simple test tool.".to_string(),
            json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        )
    }

    async fn call(&self, _arguments: Value) -> Result<Value, ToolError> {
        Ok(json!(format!("Hello from {}", self.server_name)))
    }
}
