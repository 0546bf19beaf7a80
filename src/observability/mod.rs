//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, fmt + capture layers)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → Log output (stdout, text or JSON)
//!     → Collector (through the capture layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging via tracing; the capture layer sits beside the fmt layer
//! - Metrics are cheap facade calls and no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
