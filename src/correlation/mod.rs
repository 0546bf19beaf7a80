//! Correlation engine.
//!
//! # Data Flow
//! ```text
//! captured LogEvent / OutboundCallEvent
//!     → Correlator
//!         PerRequest: task-local current() → that request's RequestContext
//!                     (no current request → dropped)
//!         Batched:    EventBuffer (shared, drained by the flusher)
//! ```
//!
//! # Design Decisions
//! - Attribution follows the task that emitted the event, never a broadcast
//!   over every open request
//! - The registry exists for eviction of abandoned contexts only
//! - Locks are held for a push or a drain, never across an await

pub mod buffer;
pub mod context;
pub mod registry;

use std::sync::Arc;

pub use buffer::EventBuffer;
pub use context::{current, propagate, scope, Completion, RequestContext, RequestHandle};
pub use registry::ContextRegistry;

use crate::events::{Event, LogEvent, OutboundCallEvent};
use crate::observability::metrics;

/// Routes captured events to where the active strategy keeps them.
#[derive(Debug, Clone)]
pub enum Correlator {
    PerRequest,
    Batched(Arc<EventBuffer>),
}

impl Correlator {
    pub fn record_log(&self, event: LogEvent) {
        let accepted = match self {
            Correlator::PerRequest => current().is_some_and(|ctx| ctx.push_log(event)),
            Correlator::Batched(buffer) => {
                buffer.push(Event::Log(event));
                true
            }
        };
        if accepted {
            metrics::record_captured("log");
        }
    }

    pub fn record_call(&self, event: OutboundCallEvent) {
        let accepted = match self {
            Correlator::PerRequest => current().is_some_and(|ctx| ctx.push_call(event)),
            Correlator::Batched(buffer) => {
                buffer.push(Event::OutboundCall(event));
                true
            }
        };
        if accepted {
            metrics::record_captured("external");
        }
    }
}
