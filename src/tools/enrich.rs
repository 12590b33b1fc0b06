//! Contact enrichment tool

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::collaborator::{ExternalService, ServiceError};
use crate::protocol::{McpTool, Tool, ToolError};

/// Forwards its arguments to the enrichment API and returns the response
pub struct ContactEnrichTool {
    service: Arc<dyn ExternalService>,
}

impl ContactEnrichTool {
    pub fn new(service: Arc<dyn ExternalService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for ContactEnrichTool {
    fn definition(&self) -> McpTool {
        McpTool::new(
            "contact_enrich".to_string(),
            "Call the Contact Enrich API to enrich contact details. Pass JSON with keys like FirstName, LastName, Address.".to_string(),
            json!({
                "type": "object",
                "minProperties": 1,
                "additionalProperties": true
            }),
        )
    }

    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        self.service
            .call(arguments)
            .await
            .map_err(|e| match e {
                // The API refused the request itself, not a failure on its side
                ServiceError::Status { status, .. } if (400..500).contains(&status) => {
                    ToolError::InvalidArguments(e.to_string())
                }
                other => ToolError::Collaborator(other.to_string()),
            })
    }
}
