//! HTTP adapter subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, trace + timeout layers)
//!     → middleware/track.rs (context, policy gate, scope)
//!     → application handler
//!     → body.rs (response body stream, finalize on end or drop)
//!     → Send to client
//! ```

pub mod body;
pub mod middleware;
pub mod server;

pub use body::TrackedBody;
pub use middleware::track_middleware;
pub use server::HttpServer;
