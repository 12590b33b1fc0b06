//! Tool dispatcher
//!
//! Maps tool names to handlers, validates arguments and normalizes every
//! outcome into a [`CallResult`]. Tools are registered before the dispatcher is
//! shared behind an `Arc`, after which it is read-only.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::protocol::{McpTool, Tool, ToolError};
use crate::types::CallResult;
use crate::validation::ArgumentValidator;

/// Registration failures. These are configuration bugs, not client errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("duplicate tool name: {0}")]
    DuplicateToolName(String),
    #[error("tool {name} has an invalid input schema: {reason}")]
    InvalidSchema { name: String, reason: String },
}

struct RegisteredTool {
    definition: McpTool,
    validator: ArgumentValidator,
    handler: Arc<dyn Tool>,
}

/// Registry of callable tools
#[derive(Default)]
pub struct ToolDispatcher {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; names must be unique
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<&mut Self, DispatchError> {
        let definition = tool.definition();
        if self.index.contains_key(&definition.name) {
            return Err(DispatchError::DuplicateToolName(definition.name));
        }

        let validator = ArgumentValidator::compile(&definition.input_schema).map_err(|e| {
            DispatchError::InvalidSchema {
                name: definition.name.clone(),
                reason: e.to_string(),
            }
        })?;

        debug!(tool = %definition.name, "tool registered");
        self.index.insert(definition.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool {
            definition,
            validator,
            handler: tool,
        });
        Ok(self)
    }

    /// Tool catalog in registration order
    pub fn list_tools(&self) -> Vec<McpTool> {
        self.tools.iter().map(|t| t.definition.clone()).collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invoke a tool by name
    ///
    /// Never fails: unknown tools, invalid arguments, handler errors and
    /// handler panics all come back as `CallResult { success: false }`.
    pub async fn invoke(&self, name: &str, arguments: Value) -> CallResult {
        let Some(tool) = self.index.get(name).map(|&i| &self.tools[i]) else {
            debug!(tool = name, "call to unknown tool");
            return CallResult::failure(format!("Unknown tool: {name}"));
        };

        if let Err(e) = tool.validator.validate(&arguments) {
            debug!(tool = name, error = %e, "arguments rejected by schema");
            return CallResult::failure(format!("Invalid arguments for {name}: {e}"));
        }

        let outcome = AssertUnwindSafe(tool.handler.call(arguments))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(data)) => CallResult::success(data),
            Ok(Err(err)) => {
                match &err {
                    ToolError::Collaborator(message) => {
                        warn!(tool = name, error = %message, "external service call failed");
                    }
                    other => debug!(tool = name, error = %other, "tool returned an error"),
                }
                CallResult::failure(err.to_string())
            }
            Err(_) => {
                error!(tool = name, "tool handler panicked");
                CallResult::failure(format!("Tool {name} failed unexpectedly"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> McpTool {
            McpTool::new(
                "echo".to_string(),
                "Return the arguments unchanged".to_string(),
                json!({"type": "object"}),
            )
        }

        async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
            Ok(arguments)
        }
    }

    struct StrictTool;

    #[async_trait]
    impl Tool for StrictTool {
        fn definition(&self) -> McpTool {
            McpTool::new(
                "strict".to_string(),
                "Needs an integer x".to_string(),
                json!({
                    "type": "object",
                    "properties": { "x": { "type": "integer" } },
                    "required": ["x"]
                }),
            )
        }

        async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
            Ok(arguments["x"].clone())
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn definition(&self) -> McpTool {
            McpTool::new("fail".to_string(), String::new(), json!({}))
        }

        async fn call(&self, _arguments: Value) -> Result<Value, ToolError> {
            Err(ToolError::Collaborator("HTTP error: 503 - busy".to_string()))
        }
    }

    struct PanickingTool;

    #[async_trait]
    impl Tool for PanickingTool {
        fn definition(&self) -> McpTool {
            McpTool::new("panic".to_string(), String::new(), json!({}))
        }

        async fn call(&self, _arguments: Value) -> Result<Value, ToolError> {
            panic!("handler bug")
        }
    }

    fn dispatcher() -> ToolDispatcher {
        let mut dispatcher = ToolDispatcher::new();
        dispatcher
            .register(Arc::new(EchoTool))
            .unwrap()
            .register(Arc::new(StrictTool))
            .unwrap()
            .register(Arc::new(FailingTool))
            .unwrap()
            .register(Arc::new(PanickingTool))
            .unwrap();
        dispatcher
    }

    #[tokio::test]
    async fn test_echo_round_trip() {
        let result = dispatcher().invoke("echo", json!({"x": 1})).await;
        assert_eq!(result, CallResult::success(json!({"x": 1})));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut dispatcher = ToolDispatcher::new();
        dispatcher.register(Arc::new(EchoTool)).unwrap();
        let err = dispatcher.register(Arc::new(EchoTool)).err();
        assert_eq!(err, Some(DispatchError::DuplicateToolName("echo".to_string())));
        assert_eq!(dispatcher.len(), 1);
    }

    #[test]
    fn test_list_tools_keeps_registration_order() {
        let names: Vec<String> = dispatcher().list_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["echo", "strict", "fail", "panic"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_failure() {
        let result = dispatcher().invoke("nope", json!({})).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Unknown tool: nope"));
    }

    #[tokio::test]
    async fn test_schema_violation_is_failure() {
        let result = dispatcher().invoke("strict", json!({"x": "one"})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Invalid arguments for strict"));
    }

    #[tokio::test]
    async fn test_handler_error_is_failure() {
        let result = dispatcher().invoke("fail", json!({})).await;
        assert_eq!(result, CallResult::failure("HTTP error: 503 - busy"));
    }

    #[tokio::test]
    async fn test_handler_panic_is_contained() {
        let result = dispatcher().invoke("panic", json!({})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("failed unexpectedly"));
    }
}
