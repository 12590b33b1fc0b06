//! reqwest-backed implementation of [`ExternalService`]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tracing::debug;

use super::{ExternalService, ServiceError};

/// Default timeout of one outbound call
pub const DEFAULT_SERVICE_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how to reach the external API
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Endpoint receiving the POSTed request bodies
    pub url: Option<String>,
    pub timeout: Duration,
    /// Extra headers sent with every request
    pub headers: Vec<(String, String)>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout: DEFAULT_SERVICE_TIMEOUT,
            headers: Vec::new(),
        }
    }
}

/// POSTs JSON request bodies to a fixed endpoint
pub struct HttpService {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl HttpService {
    pub fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ServiceError::NotConfigured(format!("header {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ServiceError::NotConfigured(format!("header {name}: {e}")))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ServiceError::NotConfigured(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn map_send_error(&self, err: reqwest::Error) -> ServiceError {
        if err.is_timeout() {
            ServiceError::Timeout(self.config.timeout)
        } else {
            ServiceError::Request(err.to_string())
        }
    }
}

#[async_trait]
impl ExternalService for HttpService {
    async fn call(&self, request: Value) -> Result<Value, ServiceError> {
        let url = self
            .config
            .url
            .as_deref()
            .ok_or_else(|| ServiceError::NotConfigured("ENRICH_API_URL is not set".to_string()))?;

        debug!(%url, "calling external service");
        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                ServiceError::Timeout(self.config.timeout)
            } else {
                ServiceError::Decode(e.to_string())
            }
        })
    }
}
