//! Event records shipped to the collector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One observed occurrence destined for the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    Log(LogEvent),
    #[serde(rename = "external")]
    OutboundCall(OutboundCallEvent),
    Incoming(IncomingRequestEvent),
}

impl Event {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Log(_) => "log",
            Event::OutboundCall(_) => "external",
            Event::Incoming(_) => "incoming",
        }
    }
}

impl From<LogEvent> for Event {
    fn from(event: LogEvent) -> Self {
        Event::Log(event)
    }
}

impl From<OutboundCallEvent> for Event {
    fn from(event: OutboundCallEvent) -> Self {
        Event::OutboundCall(event)
    }
}

impl From<IncomingRequestEvent> for Event {
    fn from(event: IncomingRequestEvent) -> Self {
        Event::Incoming(event)
    }
}

/// Severity of a captured log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<&tracing::Level> for LogLevel {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE => LogLevel::Trace,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warn,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEvent {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A single outgoing HTTP call made through the traced client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundCallEvent {
    pub method: String,
    pub url: String,
    /// `0` when no response was ever received.
    pub status: u16,
    pub duration_ms: u64,
    #[serde(rename = "response", default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// How a request record was sealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestOutcome {
    /// Still open.
    #[default]
    Pending,
    /// The handler produced a response and it was written.
    Completed,
    /// The policy gate short-circuited the request.
    Rejected,
    /// The connection went away, or the context outlived its TTL.
    Abandoned,
}

/// Aggregate record for one inbound request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingRequestEvent {
    pub request_id: Uuid,
    pub method: String,
    /// Original URL: path plus query string.
    pub path: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "consoleLogs", default)]
    pub logs: Vec<LogEvent>,
    #[serde(rename = "externalCalls", default)]
    pub calls: Vec<OutboundCallEvent>,
    pub response: Option<Value>,
    pub status: Option<u16>,
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub outcome: RequestOutcome,
}

impl IncomingRequestEvent {
    pub fn new(request_id: Uuid, method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            request_id,
            method: method.into(),
            path: path.into(),
            timestamp: Utc::now(),
            logs: Vec::new(),
            calls: Vec::new(),
            response: None,
            status: None,
            duration_ms: None,
            outcome: RequestOutcome::Pending,
        }
    }
}
