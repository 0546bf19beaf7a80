//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_tracker, ValidationError};

/// Environment variable overriding `tracker.api_key`.
pub const API_KEY_ENV: &str = "TRACKER_API_KEY";

/// Environment variable overriding `tracker.tracking_url`.
pub const TRACKING_URL_ENV: &str = "TRACKER_URL";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse, apply environment overrides and validate.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let mut config: AppConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config);

    validate_tracker(&config.tracker).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Secrets are usually injected through the environment rather than the file.
pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.is_empty() {
            config.tracker.api_key = key;
        }
    }
    if let Ok(url) = std::env::var(TRACKING_URL_ENV) {
        if !url.is_empty() {
            config.tracker.tracking_url = url;
        }
    }
}
