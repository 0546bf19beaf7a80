//! End-to-end tests of the per-request strategy against a mock collector.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{Request, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::layer::SubscriberExt;

use request_tracker::{TracedClient, Tracker};

mod common;
use common::{incoming, MockCollector, TEST_API_KEY};

#[derive(Clone)]
struct TestState {
    client: TracedClient,
    collector_url: String,
    track_endpoint: String,
    hits: Arc<AtomicUsize>,
}

async fn work(State(state): State<TestState>) -> Json<Value> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    tracing::info!("working on it");
    let upstream = state
        .client
        .get(format!("{}/upstream", state.collector_url))
        .send()
        .await
        .unwrap();
    Json(json!({ "done": true, "upstream": upstream.status().as_u16() }))
}

async fn talk_to_collector(State(state): State<TestState>) -> &'static str {
    let _ = state
        .client
        .post(&state.track_endpoint)
        .json(&json!({ "events": [] }))
        .send()
        .await;
    "ok"
}

async fn say(State(state): State<TestState>, body: String) -> String {
    state.hits.fetch_add(1, Ordering::SeqCst);
    tokio::task::yield_now().await;
    tracing::info!(said = %body, "saying");
    tokio::task::yield_now().await;
    body
}

struct Harness {
    collector: MockCollector,
    tracker: Tracker,
    app: Router,
    hits: Arc<AtomicUsize>,
    _subscriber: DefaultGuard,
}

async fn harness() -> Harness {
    let collector = MockCollector::start().await;
    let tracker = Tracker::new(collector.tracker_config()).unwrap();
    let subscriber = tracing_subscriber::registry().with(tracker.capture_layer());
    let guard = tracing::subscriber::set_default(subscriber);

    let hits = Arc::new(AtomicUsize::new(0));
    let state = TestState {
        client: tracker.client(),
        collector_url: collector.url(),
        track_endpoint: tracker.config().track_endpoint(),
        hits: hits.clone(),
    };
    let app = Router::new()
        .route("/work", get(work))
        .route("/self", get(talk_to_collector))
        .route("/say", axum::routing::post(say))
        .route("/gone", get(|| async { StatusCode::NO_CONTENT }))
        .route("/same", get(|| async { StatusCode::NOT_MODIFIED }))
        .route("/quiet", get(|| async {}))
        .with_state(state);

    Harness {
        app: tracker.instrument(app),
        collector,
        tracker,
        hits,
        _subscriber: guard,
    }
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, body)
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_allowed_request_is_recorded_once() {
    let h = harness().await;

    let (status, body) = call(&h.app, get_request("/work?page=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["upstream"], 200);

    let payloads = h.collector.wait_for_payloads(1).await;
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(h.collector.payloads().len(), 1);

    let records = incoming(&payloads);
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record["method"], "GET");
    assert_eq!(record["path"], "/work?page=2");
    assert_eq!(record["status"], 200);
    assert_eq!(record["outcome"], "completed");
    assert_eq!(record["response"]["done"], true);

    let logs = record["consoleLogs"].as_array().unwrap();
    assert!(logs.iter().any(|l| l["message"] == "working on it"));

    let calls = record["externalCalls"].as_array().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["method"], "GET");
    assert_eq!(calls[0]["url"], format!("{}/upstream", h.collector.url()));
    assert_eq!(calls[0]["status"], 200);
    assert_eq!(calls[0]["response"]["items"][2], 3);

    assert_eq!(h.collector.api_keys(), vec![TEST_API_KEY.to_string()]);
    assert_eq!(h.tracker.open_requests(), 0);
}

#[tokio::test]
async fn test_tracer_disabled_rejects_with_400() {
    let h = harness().await;
    h.collector.set_policy(json!({ "tracer": false }));

    let (status, body) = call(&h.app, get_request("/work")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Tracer disabled" }));
    assert_eq!(h.hits.load(Ordering::SeqCst), 0);

    // Rejections are delivered before the response is returned.
    let records = incoming(&h.collector.payloads());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["status"], 400);
    assert_eq!(records[0]["outcome"], "rejected");
    assert_eq!(records[0]["response"]["error"], "Tracer disabled");
}

#[tokio::test]
async fn test_missing_tracer_field_rejects() {
    let h = harness().await;
    h.collector.set_policy(json!({ "apiEnabled": false }));

    let (status, _) = call(&h.app, get_request("/work")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_api_enabled_rejects_with_403() {
    let h = harness().await;
    h.collector
        .set_policy(json!({ "tracer": true, "apiEnabled": true }));

    let (status, body) = call(&h.app, get_request("/work")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "API Enabled by config");
    assert_eq!(h.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_outside_schedule_rejects_with_403() {
    let h = harness().await;
    // An inverted window admits no time of day.
    h.collector.set_policy(json!({
        "tracer": true,
        "apiEnabled": false,
        "scheduling": { "enabled": true, "startTime": "23:59", "endTime": "00:00" }
    }));

    let (status, body) = call(&h.app, get_request("/work")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Outside schedule window");
}

#[tokio::test]
async fn test_rate_limited_rejects_with_429() {
    let h = harness().await;
    h.collector.set_policy(json!({
        "tracer": true,
        "apiEnabled": false,
        "requestLimit": { "enabled": true }
    }));
    h.collector.set_blocked(true);

    let (status, body) = call(&h.app, get_request("/work")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "Rate limit exceeded");
    assert_eq!(h.collector.rate_hits(), 1);

    h.collector.set_blocked(false);
    let (status, _) = call(&h.app, get_request("/work")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_not_consulted_when_disabled() {
    let h = harness().await;
    h.collector.set_blocked(true);

    let (status, _) = call(&h.app, get_request("/work")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.collector.rate_hits(), 0);
}

#[tokio::test]
async fn test_policy_fetch_failure_lets_request_through() {
    let h = harness().await;
    h.collector.fail_config(true);

    let (status, _) = call(&h.app, get_request("/work")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.hits.load(Ordering::SeqCst), 1);

    let records = incoming(&h.collector.wait_for_payloads(1).await);
    assert_eq!(records[0]["outcome"], "completed");
}

#[tokio::test]
async fn test_calls_to_collector_are_not_captured() {
    let h = harness().await;

    let (status, _) = call(&h.app, get_request("/self")).await;
    assert_eq!(status, StatusCode::OK);

    let payloads = h.collector.wait_for_payloads(2).await;
    let records = incoming(&payloads);
    assert_eq!(records.len(), 1);
    assert!(records[0]["externalCalls"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_interleaved_requests_keep_their_own_logs() {
    let h = harness().await;

    let say = |text: &'static str| {
        Request::builder()
            .method("POST")
            .uri("/say")
            .body(Body::from(text))
            .unwrap()
    };
    let (a, b) = tokio::join!(call(&h.app, say("alpha")), call(&h.app, say("beta")));
    assert_eq!(a.1, "alpha");
    assert_eq!(b.1, "beta");

    let records = incoming(&h.collector.wait_for_payloads(2).await);
    assert_eq!(records.len(), 2);
    for record in records {
        let said = record["response"].as_str().unwrap().to_string();
        let logs = record["consoleLogs"].as_array().unwrap();
        let messages: Vec<&str> = logs
            .iter()
            .filter_map(|l| l["message"].as_str())
            .filter(|m| m.starts_with("saying"))
            .collect();
        assert_eq!(messages, vec![format!("saying said={said}").as_str()]);
    }
}

#[tokio::test]
async fn test_dropped_body_is_recorded_as_abandoned() {
    let h = harness().await;

    let response = h.app.clone().oneshot(get_request("/work")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    drop(response);

    let records = incoming(&h.collector.wait_for_payloads(1).await);
    assert_eq!(records[0]["outcome"], "abandoned");
    assert_eq!(records[0]["status"], 200);
}

#[tokio::test]
async fn test_logs_outside_a_request_are_dropped() {
    let h = harness().await;
    tracing::info!("no request in flight");

    let (status, _) = call(&h.app, get_request("/work")).await;
    assert_eq!(status, StatusCode::OK);

    let records = incoming(&h.collector.wait_for_payloads(1).await);
    let logs = records[0]["consoleLogs"].as_array().unwrap();
    assert!(logs.iter().all(|l| l["message"] != "no request in flight"));
}

#[tokio::test]
async fn test_policy_cache_skips_repeat_fetches() {
    let collector = MockCollector::start().await;
    let mut config = collector.tracker_config();
    config.policy_cache_ttl_ms = 60_000;
    let tracker = Tracker::new(config).unwrap();

    let app = tracker.instrument(
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .route("/pong", get(|| async { "ping" })),
    );
    for _ in 0..3 {
        let (status, _) = call(&app, get_request("/ping")).await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(collector.config_hits(), 1);

    // The query string does not make a new cache entry.
    for uri in ["/ping?a=1", "/ping?a=2"] {
        let (status, _) = call(&app, get_request(uri)).await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(collector.config_hits(), 1);

    let (status, _) = call(&app, get_request("/pong")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(collector.config_hits(), 2);
}

#[tokio::test]
async fn test_client_gone_during_rejection_leaves_nothing_open() {
    let collector = MockCollector::start().await;
    collector.set_policy(json!({ "tracer": false }));
    collector.delay_track(std::time::Duration::from_secs(2));
    let mut config = collector.tracker_config();
    config.collector_timeout_ms = 300;
    let tracker = Tracker::new(config).unwrap();
    let app = tracker.instrument(Router::new().route("/ping", get(|| async { "pong" })));

    // The caller gives up while the rejection record is still in flight.
    let cut = tokio::time::timeout(
        std::time::Duration::from_millis(100),
        app.oneshot(get_request("/ping")),
    )
    .await;
    assert!(cut.is_err());

    for _ in 0..50 {
        if tracker.open_requests() == 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(tracker.open_requests(), 0);
}

#[tokio::test]
async fn test_bodiless_responses_are_completed() {
    let h = harness().await;

    let head = Request::builder()
        .method("HEAD")
        .uri("/work")
        .body(Body::empty())
        .unwrap();
    for request in [head, get_request("/gone"), get_request("/same"), get_request("/quiet")] {
        let response = h.app.clone().oneshot(request).await.unwrap();
        drop(response);
    }

    let records = incoming(&h.collector.wait_for_payloads(4).await);
    assert_eq!(records.len(), 4);
    for record in &records {
        assert_eq!(record["outcome"], "completed", "{record}");
    }
    let mut statuses: Vec<u64> = records.iter().filter_map(|r| r["status"].as_u64()).collect();
    statuses.sort();
    assert_eq!(statuses, vec![200, 200, 204, 304]);
    assert_eq!(h.tracker.open_requests(), 0);
}

#[tokio::test]
async fn test_instrumented_body_keeps_its_length() {
    use axum::body::HttpBody;

    let h = harness().await;
    let route = || Router::new().route("/json", get(|| async { Json(json!({ "a": 1 })) }));

    let bare = route().oneshot(get_request("/json")).await.unwrap();
    let tracked = h
        .tracker
        .instrument(route())
        .oneshot(get_request("/json"))
        .await
        .unwrap();

    assert_eq!(bare.body().size_hint().exact(), Some(7));
    assert_eq!(tracked.body().size_hint().exact(), Some(7));
}
