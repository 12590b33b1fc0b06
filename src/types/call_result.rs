//! CallResult envelope
//!
//! Every tool invocation outcome is normalized into this shape before it is
//! embedded in an event payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire-level outcome of a tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResult {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl CallResult {
    /// Successful invocation carrying the handler output
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed invocation carrying a human readable message
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}
