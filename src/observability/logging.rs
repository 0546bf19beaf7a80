//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global subscriber
//! - Compose the fmt output layer with the tracker's capture layer
//! - Configure log level from the environment or config
//!
//! # Design Decisions
//! - JSON format for production, text format for development
//! - `RUST_LOG` wins over the configured level
//! - The level filter applies to the output layer only; the capture layer
//!   applies its own `capture_level`

use tracing::Subscriber;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::capture::CaptureLayer;
use crate::config::ObservabilityConfig;

/// The process subscriber: filtered output next to unfiltered capture.
pub fn subscriber(
    config: &ObservabilityConfig,
    capture: CaptureLayer,
) -> impl Subscriber + Send + Sync + 'static {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("request_tracker={0},tower_http={0}", config.log_level).into()
    });

    let output = if config.log_format.eq_ignore_ascii_case("json") {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(output.with_filter(filter))
        .with(capture)
}

/// Install the process-wide subscriber.
pub fn init_logging(
    config: &ObservabilityConfig,
    capture: CaptureLayer,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    subscriber(config, capture).try_init()
}
