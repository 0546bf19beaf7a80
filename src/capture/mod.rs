//! Interception of the process's log lines and outbound HTTP calls.
//!
//! # Data Flow
//! ```text
//! tracing::info!(...)   → CaptureLayer::on_event → LogEvent          ─┐
//! TracedClient::send    → timed reqwest call     → OutboundCallEvent ─┴→ Correlator
//! ```
//!
//! # Design Decisions
//! - Both interceptors are composed in explicitly (subscriber layer, client
//!   wrapper); nothing replaces a global entry point
//! - Capture never changes what the caller observes

pub mod client;
pub mod log_layer;

pub use client::{TracedClient, TracedRequest, TracedResponse};
pub use log_layer::{suppressed, CaptureLayer};
