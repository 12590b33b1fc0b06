//! JSON Schema validation of tool arguments

use serde_json::Value;
use thiserror::Error;

/// Schema compilation or validation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The tool's own schema is unusable
    #[error("invalid tool schema: {0}")]
    InvalidSchema(String),
    /// Arguments violate the schema; violations joined by `; `
    #[error("{0}")]
    Violations(String),
}

/// Compiled input schema of a tool
pub struct ArgumentValidator {
    validator: jsonschema::Validator,
}

impl ArgumentValidator {
    /// Compile a schema once, at registration time
    pub fn compile(schema: &Value) -> Result<Self, SchemaError> {
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;
        Ok(Self { validator })
    }

    /// Check arguments against the compiled schema
    pub fn validate(&self, arguments: &Value) -> Result<(), SchemaError> {
        if self.validator.is_valid(arguments) {
            return Ok(());
        }
        let errors: Vec<String> = self
            .validator
            .iter_errors(arguments)
            .map(|e| e.to_string())
            .collect();
        Err(SchemaError::Violations(errors.join("; ")))
    }
}
