//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → TrackerConfig handed to Tracker::new
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A configuration error is fatal: the tracker refuses to install

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{
    apply_env_overrides, load_config, parse_config, ConfigError, API_KEY_ENV, TRACKING_URL_ENV,
};
pub use schema::{AppConfig, CorrelationMode, ObservabilityConfig, ServerConfig, TrackerConfig};
pub use validation::{validate_tracker, ValidationError};
