//! Shared utilities for integration testing.
//!
//! `MockCollector` plays the tracking service: it serves policies and rate
//! status, records every payload posted to `/api/track`, and doubles as an
//! upstream that traced clients can call.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use request_tracker::config::TrackerConfig;

pub const TEST_API_KEY: &str = "hardcoded-test-key";

#[derive(Default)]
struct CollectorState {
    policy: Mutex<Value>,
    blocked: AtomicBool,
    fail_config: AtomicBool,
    fail_track: AtomicBool,
    track_delay_ms: AtomicU64,
    payloads: Mutex<Vec<Value>>,
    api_keys: Mutex<Vec<String>>,
    config_hits: AtomicUsize,
    rate_hits: AtomicUsize,
}

#[derive(Clone)]
pub struct MockCollector {
    addr: SocketAddr,
    state: Arc<CollectorState>,
}

impl MockCollector {
    /// Bind on an ephemeral port and serve in the background.
    pub async fn start() -> Self {
        let state = Arc::new(CollectorState::default());
        *state.policy.lock() = allow_all();

        let app = Router::new()
            .route("/api/config", get(config))
            .route("/api/requestCount", get(request_count))
            .route("/api/track", post(track))
            .route("/upstream", get(upstream))
            .with_state(state.clone());

        // Served from a thread of its own so the collector's server-side
        // events never reach the subscriber installed by a test.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let listener = TcpListener::from_std(listener).unwrap();
                let _ = axum::serve(listener, app).await;
            });
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig::new(self.url(), TEST_API_KEY)
    }

    pub fn set_policy(&self, policy: Value) {
        *self.state.policy.lock() = policy;
    }

    pub fn set_blocked(&self, blocked: bool) {
        self.state.blocked.store(blocked, Ordering::SeqCst);
    }

    pub fn fail_config(&self, fail: bool) {
        self.state.fail_config.store(fail, Ordering::SeqCst);
    }

    pub fn fail_track(&self, fail: bool) {
        self.state.fail_track.store(fail, Ordering::SeqCst);
    }

    /// Hold every `/api/track` response for `delay`.
    pub fn delay_track(&self, delay: Duration) {
        self.state
            .track_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn config_hits(&self) -> usize {
        self.state.config_hits.load(Ordering::SeqCst)
    }

    pub fn rate_hits(&self) -> usize {
        self.state.rate_hits.load(Ordering::SeqCst)
    }

    /// Every accepted `/api/track` body, in arrival order.
    pub fn payloads(&self) -> Vec<Value> {
        self.state.payloads.lock().clone()
    }

    /// Every event of every accepted payload, flattened.
    pub fn events(&self) -> Vec<Value> {
        self.payloads()
            .iter()
            .flat_map(|p| p["events"].as_array().cloned().unwrap_or_default())
            .collect()
    }

    pub fn api_keys(&self) -> Vec<String> {
        self.state.api_keys.lock().clone()
    }

    /// Wait until at least `count` payloads arrived.
    pub async fn wait_for_payloads(&self, count: usize) -> Vec<Value> {
        for _ in 0..100 {
            let payloads = self.payloads();
            if payloads.len() >= count {
                return payloads;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("expected {count} payloads, got {:?}", self.payloads());
    }
}

/// Policy that lets every request through.
pub fn allow_all() -> Value {
    json!({ "tracer": true, "apiEnabled": false })
}

/// The `incoming` events of a set of payloads.
pub fn incoming(payloads: &[Value]) -> Vec<Value> {
    payloads
        .iter()
        .flat_map(|p| p["events"].as_array().cloned().unwrap_or_default())
        .filter(|e| e["type"] == "incoming")
        .collect()
}

async fn config(State(state): State<Arc<CollectorState>>) -> impl IntoResponse {
    state.config_hits.fetch_add(1, Ordering::SeqCst);
    if state.fail_config.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "down" })));
    }
    (StatusCode::OK, Json(state.policy.lock().clone()))
}

async fn request_count(State(state): State<Arc<CollectorState>>) -> Json<Value> {
    state.rate_hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "blocked": state.blocked.load(Ordering::SeqCst) }))
}

async fn track(
    State(state): State<Arc<CollectorState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    let delay = state.track_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if state.fail_track.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    if let Some(key) = headers.get("x-track-api-key").and_then(|v| v.to_str().ok()) {
        state.api_keys.lock().push(key.to_string());
    }
    state.payloads.lock().push(body);
    StatusCode::OK
}

async fn upstream() -> Json<Value> {
    Json(json!({ "items": [1, 2, 3] }))
}
