//! Policy gate subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request path
//!     → cache.rs (optional, TTL-bounded)
//!     → GET /api/config          → types.rs Policy
//!     → gate.rs evaluate()       → reject / allow / ask rate limiter
//!     → GET /api/requestCount    → RateStatus
//!     → GateDecision
//! ```

pub mod cache;
pub mod gate;
pub mod types;

pub use cache::PolicyCache;
pub use gate::{evaluate, local_hhmm, GateDecision, GateError, PolicyGate, Rejection, Verdict};
pub use types::{Policy, RateStatus, RequestLimit, Schedule};
