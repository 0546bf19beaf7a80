//! Delivery of event payloads to the collector.
//!
//! # Responsibilities
//! - POST `{events: [...]}` to `{base}/api/track` with the `x-track-api-key` header
//! - Report any network failure or non-2xx answer as a `TransmitError`
//!
//! # Design Decisions
//! - Never retries internally; the per-request finalizer discards on failure and
//!   the batch flusher requeues
//! - Uses a plain `reqwest::Client`, never the traced one, so deliveries are not
//!   captured as outbound calls

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;

use crate::capture::suppressed;
use crate::config::TrackerConfig;
use crate::events::Event;
use crate::observability::metrics;

/// Header carrying the collector credential.
pub const API_KEY_HEADER: &str = "x-track-api-key";

/// Log target of this module. The capture layer ignores it.
pub const TRANSMIT_TARGET: &str = module_path!();

#[derive(Debug, Error)]
pub enum TransmitError {
    #[error("collector unreachable: {0}")]
    Request(#[from] reqwest::Error),

    #[error("collector answered {0}")]
    Status(StatusCode),
}

#[derive(Serialize)]
struct TrackPayload<'a> {
    events: &'a [Event],
}

/// Posts events to the collector's ingestion endpoint.
#[derive(Debug, Clone)]
pub struct Transmitter {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl Transmitter {
    pub fn new(config: &TrackerConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.collector_timeout_ms))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &TrackerConfig) -> Self {
        Self {
            client,
            endpoint: config.track_endpoint(),
            api_key: config.api_key.clone(),
        }
    }

    /// Full URL events are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one payload. The caller decides what to do on failure.
    pub async fn send(&self, events: &[Event]) -> Result<(), TransmitError> {
        let result = suppressed(self.post(events)).await;

        match &result {
            Ok(()) => {
                tracing::debug!(count = events.len(), "Events delivered");
            }
            Err(e) => {
                tracing::warn!(count = events.len(), error = %e, "Event delivery failed");
            }
        }
        metrics::record_transmission(result.is_ok(), events.len());

        result
    }

    async fn post(&self, events: &[Event]) -> Result<(), TransmitError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&TrackPayload { events })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransmitError::Status(status));
        }
        Ok(())
    }
}
