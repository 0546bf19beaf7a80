//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the tracker
//! and the demo service that hosts it. All types derive Serde traits for
//! deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Demo HTTP server settings.
    pub server: ServerConfig,

    /// Instrumentation layer settings.
    pub tracker: TrackerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HTTP server configuration for the instrumented demo service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Upstream called by `GET /fetch` through the traced client.
    pub upstream_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            upstream_url: None,
        }
    }
}

/// How captured events are attributed and shipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMode {
    /// One aggregate record per inbound request, sent when the response completes.
    #[default]
    PerRequest,
    /// Every event goes into one shared buffer drained on a timer.
    Batched,
}

/// Tracker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Collector base URL.
    pub tracking_url: String,

    /// Credential sent as `x-track-api-key`. Required.
    pub api_key: String,

    /// Accepted keys. Empty means any key passing the format check.
    pub allowed_api_keys: Vec<String>,

    /// Correlation strategy.
    pub mode: CorrelationMode,

    /// Batch flush interval in milliseconds (batched mode only).
    pub send_interval_ms: u64,

    /// Timeout for every collector call in milliseconds.
    pub collector_timeout_ms: u64,

    /// Per-path policy cache lifetime in milliseconds. 0 fetches on every request.
    pub policy_cache_ttl_ms: u64,

    /// Most paths the policy cache holds at once.
    pub policy_cache_max_entries: usize,

    /// Age after which an unfinished request context is evicted as abandoned.
    pub context_ttl_secs: u64,

    /// Interval of the eviction sweep in seconds.
    pub sweep_interval_secs: u64,

    /// Maximum number of body bytes kept in captured records.
    pub max_body_capture_bytes: usize,

    /// Most verbose level the capture layer records (trace, debug, info, warn, error).
    pub capture_level: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tracking_url: "http://localhost:3000".to_string(),
            api_key: String::new(),
            allowed_api_keys: Vec::new(),
            mode: CorrelationMode::PerRequest,
            send_interval_ms: 2000,
            collector_timeout_ms: 5000,
            policy_cache_ttl_ms: 0,
            policy_cache_max_entries: 1024,
            context_ttl_secs: 300,
            sweep_interval_secs: 30,
            max_body_capture_bytes: 64 * 1024,
            capture_level: "trace".to_string(),
        }
    }
}

impl TrackerConfig {
    /// Configuration pointing at `tracking_url` with `api_key` and defaults elsewhere.
    pub fn new(tracking_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            tracking_url: tracking_url.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Collector base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.tracking_url.trim_end_matches('/')
    }

    /// Full URL of the ingestion endpoint.
    pub fn track_endpoint(&self) -> String {
        format!("{}/api/track", self.base_url())
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "text" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
