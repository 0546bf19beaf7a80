//! Metrics collection.
//!
//! # Metrics
//! - `tracker_events_captured_total` (counter): captured events by kind
//! - `tracker_gate_decisions_total` (counter): policy gate outcomes
//! - `tracker_transmissions_total` (counter): collector posts by result
//! - `tracker_events_transmitted_total` (counter): events delivered
//! - `tracker_buffer_depth` (gauge): events waiting in the batch buffer
//! - `tracker_open_contexts` (gauge): request contexts not yet removed
//! - `tracker_requests_abandoned_total` (counter)

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_captured(kind: &'static str) {
    metrics::counter!("tracker_events_captured_total", "kind" => kind).increment(1);
}

pub fn record_gate_decision(decision: &'static str) {
    metrics::counter!("tracker_gate_decisions_total", "decision" => decision).increment(1);
}

pub fn record_transmission(success: bool, events: usize) {
    let result = if success { "ok" } else { "failed" };
    metrics::counter!("tracker_transmissions_total", "result" => result).increment(1);
    if success {
        metrics::counter!("tracker_events_transmitted_total").increment(events as u64);
    }
}

pub fn record_buffer_depth(depth: usize) {
    metrics::gauge!("tracker_buffer_depth").set(depth as f64);
}

pub fn record_open_contexts(count: usize) {
    metrics::gauge!("tracker_open_contexts").set(count as f64);
}

pub fn record_abandoned() {
    metrics::counter!("tracker_requests_abandoned_total").increment(1);
}
