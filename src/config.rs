//! Server configuration
//!
//! Read once at process start and passed explicitly to the components.
//!
//! Environment:
//! - HOST / PORT: listener address (default 0.0.0.0:8080)
//! - LOG_LEVEL: default tracing level, overridden by RUST_LOG (default info)
//! - MAX_EVENTS_PER_STREAM: events retained per session stream (default 100)
//! - SESSION_IDLE_TIMEOUT_SECS: detached sessions start draining (default 300)
//! - SESSION_DRAIN_GRACE_SECS: draining sessions are closed (default 30)
//! - SESSION_REAPER_INTERVAL_SECS: sweep interval (default 5)
//! - SSE_KEEP_ALIVE_SECS: keep-alive comment interval (default 15)
//! - ENRICH_API_URL: endpoint of the enrichment API (optional)
//! - ENRICH_API_TIMEOUT_SECS: outbound call timeout (default 30)
//! - ENRICH_API_HEADERS: extra headers, "name:value,name:value"

use std::time::Duration;

use thiserror::Error;

use crate::collaborator::ServiceConfig;
use crate::event_store::DEFAULT_MAX_EVENTS_PER_STREAM;

/// Invalid configuration value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{name} must be a non-negative integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },
    #[error("{name} entry '{entry}' is not of the form name:value")]
    InvalidHeader { name: &'static str, entry: String },
}

/// Complete configuration of the server process
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub max_events_per_stream: usize,
    pub idle_timeout: Duration,
    pub drain_grace: Duration,
    pub reaper_interval: Duration,
    pub keep_alive: Duration,
    /// Capacity of each session's live channel
    pub live_buffer: usize,
    pub service: ServiceConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            max_events_per_stream: DEFAULT_MAX_EVENTS_PER_STREAM,
            idle_timeout: Duration::from_secs(300),
            drain_grace: Duration::from_secs(30),
            reaper_interval: Duration::from_secs(5),
            keep_alive: Duration::from_secs(15),
            live_buffer: 64,
            service: ServiceConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(host) = get("HOST") {
            config.host = host;
        }
        if let Some(port) = get("PORT") {
            config.port = parse_number("PORT", &port)?;
        }
        if let Some(level) = get("LOG_LEVEL") {
            config.log_level = level.to_lowercase();
        }
        if let Some(max) = get("MAX_EVENTS_PER_STREAM") {
            config.max_events_per_stream = parse_number("MAX_EVENTS_PER_STREAM", &max)?;
        }
        if let Some(secs) = get("SESSION_IDLE_TIMEOUT_SECS") {
            config.idle_timeout = parse_secs("SESSION_IDLE_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = get("SESSION_DRAIN_GRACE_SECS") {
            config.drain_grace = parse_secs("SESSION_DRAIN_GRACE_SECS", &secs)?;
        }
        if let Some(secs) = get("SESSION_REAPER_INTERVAL_SECS") {
            config.reaper_interval = parse_interval("SESSION_REAPER_INTERVAL_SECS", &secs)?;
        }
        if let Some(secs) = get("SSE_KEEP_ALIVE_SECS") {
            config.keep_alive = parse_interval("SSE_KEEP_ALIVE_SECS", &secs)?;
        }

        config.service.url = get("ENRICH_API_URL");
        if let Some(secs) = get("ENRICH_API_TIMEOUT_SECS") {
            config.service.timeout = parse_secs("ENRICH_API_TIMEOUT_SECS", &secs)?;
        }
        if let Some(headers) = get("ENRICH_API_HEADERS") {
            config.service.headers = parse_headers("ENRICH_API_HEADERS", &headers)?;
        }

        Ok(config)
    }

    /// Address the listener binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidNumber {
        name,
        value: value.to_string(),
    })
}

fn parse_secs(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse_number::<u64>(name, value).map(Duration::from_secs)
}

// Periodic timers need a non-zero period
fn parse_interval(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match parse_secs(name, value)? {
        d if d.is_zero() => Err(ConfigError::Zero { name }),
        d => Ok(d),
    }
}

// Format: "name:value,name:value"; values may contain ':'
fn parse_headers(name: &'static str, value: &str) -> Result<Vec<(String, String)>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((key, val)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), val.trim().to_string()))
            }
            _ => Err(ConfigError::InvalidHeader {
                name,
                entry: entry.to_string(),
            }),
        })
        .collect()
}
