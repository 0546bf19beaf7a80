//! Per-request context and its task-local scope.
//!
//! The middleware runs the policy gate and the downstream handler inside
//! [`scope`], so anything emitted by that task (log lines, traced calls) can
//! find its own request through [`current`]. Spawned tasks do not inherit the
//! scope; wrap them with [`propagate`].

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use crate::events::{IncomingRequestEvent, LogEvent, OutboundCallEvent, RequestOutcome};

/// Shared handle to an open request.
pub type RequestHandle = Arc<RequestContext>;

tokio::task_local! {
    static CURRENT_REQUEST: RequestHandle;
}

/// How a request ended, as seen by whichever trigger fired first.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub status: Option<u16>,
    pub response: Option<Value>,
    pub outcome: RequestOutcome,
}

impl Completion {
    pub fn completed(status: u16, response: Option<Value>) -> Self {
        Self {
            status: Some(status),
            response,
            outcome: RequestOutcome::Completed,
        }
    }

    pub fn rejected(status: u16, response: Value) -> Self {
        Self {
            status: Some(status),
            response: Some(response),
            outcome: RequestOutcome::Rejected,
        }
    }

    /// `status` is whatever was known when the request was given up on.
    pub fn abandoned(status: Option<u16>, response: Option<Value>) -> Self {
        Self {
            status,
            response,
            outcome: RequestOutcome::Abandoned,
        }
    }
}

/// The record under construction for one inbound request.
#[derive(Debug)]
pub struct RequestContext {
    id: Uuid,
    started: Instant,
    finalized: AtomicBool,
    record: Mutex<Option<IncomingRequestEvent>>,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> RequestHandle {
        let id = Uuid::new_v4();
        Arc::new(Self {
            id,
            started: Instant::now(),
            finalized: AtomicBool::new(false),
            record: Mutex::new(Some(IncomingRequestEvent::new(id, method, path))),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn age(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    /// Append a log line. Returns false once the record is sealed.
    pub fn push_log(&self, event: LogEvent) -> bool {
        match self.record.lock().as_mut() {
            Some(record) => {
                record.logs.push(event);
                true
            }
            None => false,
        }
    }

    /// Append an outbound call. Returns false once the record is sealed.
    pub fn push_call(&self, event: OutboundCallEvent) -> bool {
        match self.record.lock().as_mut() {
            Some(record) => {
                record.calls.push(event);
                true
            }
            None => false,
        }
    }

    /// Seal the record. Only the first caller gets it back.
    ///
    /// The flag is flipped while the record lock is held, so no append can
    /// land between the check and the take.
    pub fn seal(&self, completion: Completion) -> Option<IncomingRequestEvent> {
        let mut guard = self.record.lock();
        if self.finalized.swap(true, Ordering::AcqRel) {
            return None;
        }
        let mut record = guard.take()?;
        drop(guard);

        record.status = completion.status;
        record.response = completion.response;
        record.outcome = completion.outcome;
        record.duration_ms = Some(self.started.elapsed().as_millis() as u64);
        Some(record)
    }
}

/// Run `fut` with `handle` as the current request.
pub async fn scope<F: Future>(handle: RequestHandle, fut: F) -> F::Output {
    CURRENT_REQUEST.scope(handle, fut).await
}

/// The request the calling task is serving, if any.
pub fn current() -> Option<RequestHandle> {
    CURRENT_REQUEST.try_with(Arc::clone).ok()
}

/// Carry the current request into a future that will run on another task.
///
/// ```ignore
/// tokio::spawn(correlation::propagate(async move { client.get(url).send().await }));
/// ```
pub fn propagate<F>(fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let handle = current();
    async move {
        match handle {
            Some(handle) => scope(handle, fut).await,
            None => fut.await,
        }
    }
}
