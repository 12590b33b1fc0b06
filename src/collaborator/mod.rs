//! External collaborator boundary
//!
//! Tools that reach out to a third-party API do so through
//! [`ExternalService`]. Implementations never panic past this boundary: every
//! transport or status failure comes back as a [`ServiceError`].

mod http;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use http::{HttpService, ServiceConfig};

/// Failure of an outbound API call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP error: {status} - {body}")]
    Status { status: u16, body: String },
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("service not configured: {0}")]
    NotConfigured(String),
}

/// An asynchronous request/response API the tools depend on
#[async_trait]
pub trait ExternalService: Send + Sync {
    /// Send one request body and return the decoded response payload
    async fn call(&self, request: Value) -> Result<Value, ServiceError>;
}
