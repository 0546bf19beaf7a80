//! Eviction of request contexts that never completed.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::correlation::{Completion, ContextRegistry};
use crate::finalize::Finalizer;
use crate::lifecycle::ShutdownSignal;

pub struct ContextSweeper {
    registry: Arc<ContextRegistry>,
    finalizer: Arc<Finalizer>,
    ttl: Duration,
    interval: Duration,
}

impl ContextSweeper {
    pub fn new(
        registry: Arc<ContextRegistry>,
        finalizer: Arc<Finalizer>,
        ttl: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            finalizer,
            ttl,
            interval,
        }
    }

    /// Finalize every context older than the TTL as abandoned, and drop
    /// expired ones that are already sealed.
    pub async fn sweep(&self) -> usize {
        let mut evicted = 0;
        for ctx in self.registry.expired(self.ttl) {
            // Sealed but still listed: its delivery never unregistered it.
            if ctx.is_finalized() {
                self.registry.remove(&ctx.id());
                evicted += 1;
                continue;
            }
            if self
                .finalizer
                .finalize(&ctx, Completion::abandoned(None, None))
                .await
            {
                evicted += 1;
            }
        }
        if evicted > 0 {
            tracing::info!(evicted, remaining = self.registry.len(), "Evicted abandoned requests");
        }
        evicted
    }

    pub async fn run(self, mut shutdown: ShutdownSignal) {
        let mut ticker = time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }
                _ = shutdown.wait() => {
                    tracing::info!("Context sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
