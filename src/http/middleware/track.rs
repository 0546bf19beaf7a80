//! Tracking middleware.
//!
//! Opens a request context, runs the policy gate, then either answers with the
//! rejection or calls the next service exactly once. Both the gate and the
//! downstream handler run inside the context's task-local scope.

use std::sync::Arc;

use axum::{
    body::{Body, HttpBody},
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::correlation::{scope, Completion, RequestContext, RequestHandle};
use crate::finalize::Finalizer;
use crate::http::body::TrackedBody;
use crate::policy::GateDecision;
use crate::tracker::Tracker;

/// Finalizes the context as abandoned if the request future is dropped
/// before the response body takes over.
struct PendingGuard {
    ctx: Option<RequestHandle>,
    finalizer: Arc<Finalizer>,
}

impl PendingGuard {
    fn disarm(mut self) {
        self.ctx = None;
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            tracing::debug!(request_id = %ctx.id(), "Request dropped before a response");
            self.finalizer
                .finalize_detached(&ctx, Completion::abandoned(None, None));
        }
    }
}

pub async fn track_middleware(
    State(tracker): State<Tracker>,
    request: Request,
    next: Next,
) -> Response {
    let request_method = request.method().clone();
    let method = request_method.to_string();
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let ctx = RequestContext::new(method, path.clone());
    tracker.registry().register(ctx.clone());
    let guard = PendingGuard {
        ctx: Some(ctx.clone()),
        finalizer: tracker.finalizer().clone(),
    };

    let decision = scope(ctx.clone(), tracker.gate().check(&path)).await;

    if let GateDecision::Reject(rejection) = decision {
        let body = rejection.body();
        tracker
            .finalizer()
            .finalize(
                &ctx,
                Completion::rejected(rejection.status.as_u16(), body.clone()),
            )
            .await;
        guard.disarm();
        return (rejection.status, Json(body)).into_response();
    }

    let response = scope(ctx.clone(), next.run(request)).await;
    guard.disarm();

    let status = response.status();
    if bodiless(&request_method, status) || response.body().is_end_stream() {
        // The server never polls these bodies, so the record is sealed here.
        tracker
            .finalizer()
            .finalize_detached(&ctx, Completion::completed(status.as_u16(), None));
        return response;
    }

    let (parts, body) = response.into_parts();
    let tracked = TrackedBody::new(
        body,
        ctx,
        tracker.finalizer().clone(),
        status.as_u16(),
        tracker.config().max_body_capture_bytes,
    );
    Response::from_parts(parts, Body::new(tracked))
}

/// Responses that carry no body on the wire.
fn bodiless(method: &Method, status: StatusCode) -> bool {
    method == Method::HEAD
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}
