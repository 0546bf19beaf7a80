//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the API key against the allow-list or the key format
//! - Validate value ranges (intervals > 0, URL is absolute http(s))
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: TrackerConfig → Result<(), Vec<ValidationError>>
//! - Runs before the tracker is allowed to install itself

use thiserror::Error;
use url::Url;

use crate::config::schema::{CorrelationMode, TrackerConfig};

const MIN_KEY_LEN: usize = 8;
const MAX_KEY_LEN: usize = 128;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("API key required")]
    MissingApiKey,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("tracking_url '{0}' is not an absolute http(s) URL")]
    InvalidTrackingUrl(String),

    #[error("send_interval_ms must be greater than zero in batched mode")]
    ZeroSendInterval,

    #[error("sweep_interval_secs must be greater than zero")]
    ZeroSweepInterval,

    #[error("unknown capture_level '{0}'")]
    UnknownCaptureLevel(String),
}

/// Validate the tracker section.
pub fn validate_tracker(config: &TrackerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.api_key.is_empty() {
        errors.push(ValidationError::MissingApiKey);
    } else if !api_key_accepted(config) {
        errors.push(ValidationError::InvalidApiKey);
    }

    match Url::parse(&config.tracking_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
        _ => errors.push(ValidationError::InvalidTrackingUrl(config.tracking_url.clone())),
    }

    if config.mode == CorrelationMode::Batched && config.send_interval_ms == 0 {
        errors.push(ValidationError::ZeroSendInterval);
    }

    if config.sweep_interval_secs == 0 {
        errors.push(ValidationError::ZeroSweepInterval);
    }

    if config.capture_level.parse::<tracing::Level>().is_err() {
        errors.push(ValidationError::UnknownCaptureLevel(config.capture_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn api_key_accepted(config: &TrackerConfig) -> bool {
    if !config.allowed_api_keys.is_empty() {
        return config.allowed_api_keys.iter().any(|k| k == &config.api_key);
    }

    let key = &config.api_key;
    (MIN_KEY_LEN..=MAX_KEY_LEN).contains(&key.len())
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
