//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → broadcast → HTTP server, batch flusher, context sweeper
//!     subscribe() after trigger() → resolves at once
//!
//! Signals (signals.rs):
//!     SIGINT (Ctrl+C) → Shutdown::trigger
//! ```
//!
//! # Design Decisions
//! - The flusher drains once more on shutdown; buffered events still lost on
//!   a crash are accepted loss

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
