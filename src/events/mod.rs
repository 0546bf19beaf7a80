//! Event model.
//!
//! # Data Flow
//! ```text
//! CaptureLayer (log lines)      ─┐
//! TracedClient (outbound calls) ─┼─→ Correlator → RequestContext / EventBuffer
//! track_middleware (requests)   ─┘                        → Transmitter → collector
//! ```

pub mod render;
pub mod types;

pub use render::{body_value, join_args, render_arg, Json};
pub use types::{
    Event, IncomingRequestEvent, LogEvent, LogLevel, OutboundCallEvent, RequestOutcome,
};
