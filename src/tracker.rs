//! The instrumentation layer as one handle.
//!
//! `Tracker::new` validates the configuration and wires the policy gate,
//! correlator, finalizer and transmitter for the selected mode. The handle is
//! cheap to clone and serves as the middleware state.

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, Router};
use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::Level;

use crate::capture::{CaptureLayer, TracedClient};
use crate::config::{validate_tracker, ConfigError, CorrelationMode, TrackerConfig};
use crate::correlation::{ContextRegistry, Correlator, EventBuffer};
use crate::error::TrackerError;
use crate::finalize::{BatchFlusher, ContextSweeper, Delivery, Finalizer};
use crate::http::track_middleware;
use crate::lifecycle::Shutdown;
use crate::policy::PolicyGate;
use crate::transmit::Transmitter;

#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    config: TrackerConfig,
    capture_level: Level,
    correlator: Correlator,
    gate: PolicyGate,
    registry: Arc<ContextRegistry>,
    finalizer: Arc<Finalizer>,
    flusher: Option<Arc<BatchFlusher>>,
}

impl Tracker {
    /// Build the tracker. Fails on any configuration error.
    pub fn new(config: TrackerConfig) -> Result<Self, TrackerError> {
        validate_tracker(&config).map_err(ConfigError::Validation)?;
        let capture_level = config.capture_level.parse().unwrap_or(Level::TRACE);

        let transmitter = Arc::new(Transmitter::new(&config)?);
        let gate = PolicyGate::new(&config)?;
        let registry = Arc::new(ContextRegistry::new());

        let (correlator, delivery, flusher) = match config.mode {
            CorrelationMode::PerRequest => (
                Correlator::PerRequest,
                Delivery::Direct(transmitter),
                None,
            ),
            CorrelationMode::Batched => {
                let buffer = Arc::new(EventBuffer::new());
                let flusher = BatchFlusher::new(
                    buffer.clone(),
                    transmitter,
                    Duration::from_millis(config.send_interval_ms),
                );
                (
                    Correlator::Batched(buffer.clone()),
                    Delivery::Buffered(buffer),
                    Some(Arc::new(flusher)),
                )
            }
        };

        let finalizer = Arc::new(Finalizer::new(delivery, registry.clone()));

        tracing::info!(
            tracking_url = %config.tracking_url,
            mode = ?config.mode,
            policy_cache_ttl_ms = config.policy_cache_ttl_ms,
            "Tracker configured"
        );

        Ok(Self {
            inner: Arc::new(TrackerInner {
                config,
                capture_level,
                correlator,
                gate,
                registry,
                finalizer,
                flusher,
            }),
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    /// Layer to compose into the process's `tracing` subscriber.
    pub fn capture_layer(&self) -> CaptureLayer {
        CaptureLayer::new(self.inner.correlator.clone(), self.inner.capture_level)
    }

    /// A traced client over a fresh `reqwest::Client`.
    pub fn client(&self) -> TracedClient {
        self.wrap_client(Client::new())
    }

    pub fn wrap_client(&self, client: Client) -> TracedClient {
        TracedClient::new(
            client,
            self.inner.correlator.clone(),
            self.inner.config.track_endpoint(),
            self.inner.config.max_body_capture_bytes,
        )
    }

    /// Put every route of `router` behind the tracking middleware.
    pub fn instrument(&self, router: Router) -> Router {
        router.layer(middleware::from_fn_with_state(self.clone(), track_middleware))
    }

    /// The batch flusher, in batched mode.
    pub fn flusher(&self) -> Option<Arc<BatchFlusher>> {
        self.inner.flusher.clone()
    }

    pub fn sweeper(&self) -> ContextSweeper {
        ContextSweeper::new(
            self.inner.registry.clone(),
            self.inner.finalizer.clone(),
            Duration::from_secs(self.inner.config.context_ttl_secs),
            Duration::from_secs(self.inner.config.sweep_interval_secs),
        )
    }

    /// Spawn the sweeper and, in batched mode, the flusher.
    pub fn spawn_background(&self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        let mut tasks = vec![tokio::spawn(self.sweeper().run(shutdown.subscribe()))];
        if let Some(flusher) = self.flusher() {
            tasks.push(tokio::spawn(flusher.run(shutdown.subscribe())));
        }
        tasks
    }

    /// Requests whose record has not been delivered yet.
    pub fn open_requests(&self) -> usize {
        self.inner.registry.len()
    }

    pub(crate) fn gate(&self) -> &PolicyGate {
        &self.inner.gate
    }

    pub(crate) fn registry(&self) -> &Arc<ContextRegistry> {
        &self.inner.registry
    }

    pub(crate) fn finalizer(&self) -> &Arc<Finalizer> {
        &self.inner.finalizer
    }
}
