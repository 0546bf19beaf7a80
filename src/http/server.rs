//! HTTP server for the instrumented demo service.
//!
//! # Responsibilities
//! - Create Axum Router with the demo handlers
//! - Wire up middleware (tracking, timeout, tracing)
//! - Start the tracker's background tasks
//! - Serve until the shutdown signal

use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::capture::TracedClient;
use crate::config::AppConfig;
use crate::events::Json as JsonArg;
use crate::lifecycle::Shutdown;
use crate::tracker::Tracker;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: TracedClient,
    pub upstream_url: Option<String>,
}

pub struct HttpServer {
    router: Router,
    config: AppConfig,
    tracker: Tracker,
}

impl HttpServer {
    pub fn new(config: AppConfig, tracker: Tracker) -> Self {
        let state = AppState {
            client: tracker.client(),
            upstream_url: config.server.upstream_url.clone(),
        };

        let router = Self::build_router(&config, &tracker, state);
        Self {
            router,
            config,
            tracker,
        }
    }

    /// Demo routes, behind the tracker, a request timeout and HTTP tracing.
    fn build_router(config: &AppConfig, tracker: &Tracker, state: AppState) -> Router {
        let app = Router::new()
            .route("/", get(index))
            .route("/echo", post(echo))
            .route("/fetch", get(fetch))
            .route("/health", get(health))
            .with_state(state);

        tracker.instrument(app).layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    Duration::from_secs(config.server.request_timeout_secs),
                )),
        )
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let background = self.tracker.spawn_background(&shutdown);

        let mut stop = shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { stop.wait().await })
            .await?;

        for task in background {
            let _ = task.await;
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

async fn index() -> impl IntoResponse {
    tracing::info!("Serving index");
    Json(json!({ "service": "request-tracker", "status": "ok" }))
}

async fn echo(Json(payload): Json<Value>) -> impl IntoResponse {
    tracing::info!(payload = ?JsonArg(&payload), "Echoing payload");
    Json(payload)
}

async fn fetch(State(state): State<AppState>) -> impl IntoResponse {
    let Some(url) = state.upstream_url.as_deref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "No upstream configured" })),
        )
            .into_response();
    };

    match state.client.get(url).send().await {
        Ok(response) => {
            tracing::info!(status = response.status().as_u16(), "Upstream answered");
            (response.status(), response.text()).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Upstream request failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Upstream request failed" })),
            )
                .into_response()
        }
    }
}

async fn health() -> &'static str {
    "ok"
}
