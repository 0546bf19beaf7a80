//! Top-level error type.

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
