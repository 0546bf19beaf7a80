//! Request tracking instrumentation for axum services.

pub mod capture;
pub mod config;
pub mod correlation;
pub mod error;
pub mod events;
pub mod finalize;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod policy;
pub mod tracker;
pub mod transmit;

pub use capture::{CaptureLayer, TracedClient};
pub use config::schema::{AppConfig, CorrelationMode, TrackerConfig};
pub use error::TrackerError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use tracker::Tracker;
