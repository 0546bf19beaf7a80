//! Sealing and delivery of request records.
//!
//! # Data Flow
//! ```text
//! trigger (rejection | body end | body dropped | handler dropped | sweep)
//!     → RequestContext::seal   (first trigger wins, later ones get None)
//!     → Delivery
//!         Direct:   Transmitter::send, failure logged and discarded
//!         Buffered: EventBuffer::push, shipped by flusher.rs
//!     → ContextRegistry::remove   (drop guard on the delivery task)
//! ```

pub mod flusher;
pub mod sweeper;

use std::sync::Arc;

pub use flusher::{BatchFlusher, FlushOutcome};
pub use sweeper::ContextSweeper;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::correlation::{Completion, ContextRegistry, EventBuffer, RequestContext, RequestHandle};
use crate::events::{Event, IncomingRequestEvent, RequestOutcome};
use crate::observability::metrics;
use crate::transmit::Transmitter;

/// Log target of the finalizer, flusher and sweeper. The capture layer ignores it.
pub const FINALIZE_TARGET: &str = module_path!();

/// Removes a sealed context from the registry however its delivery ends.
struct Unregister {
    registry: Arc<ContextRegistry>,
    id: Uuid,
}

impl Drop for Unregister {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}

/// Where sealed records go.
#[derive(Debug, Clone)]
pub enum Delivery {
    Direct(Arc<Transmitter>),
    Buffered(Arc<EventBuffer>),
}

#[derive(Debug)]
pub struct Finalizer {
    delivery: Delivery,
    registry: Arc<ContextRegistry>,
}

impl Finalizer {
    pub fn new(delivery: Delivery, registry: Arc<ContextRegistry>) -> Self {
        Self { delivery, registry }
    }

    /// Seal and deliver, waiting for the delivery. Returns false when another
    /// trigger already finalized the context.
    ///
    /// Delivery runs on its own task, so dropping this future part-way
    /// neither loses the record nor leaves the context registered.
    pub async fn finalize(self: &Arc<Self>, ctx: &RequestContext, completion: Completion) -> bool {
        let Some(record) = ctx.seal(completion) else {
            return false;
        };
        let id = ctx.id();

        match Handle::try_current() {
            Ok(runtime) => {
                if let Err(e) = self.spawn_delivery(&runtime, id, record).await {
                    tracing::warn!(request_id = %id, error = %e, "Request record delivery aborted");
                }
            }
            Err(_) => {
                let _unregister = Unregister {
                    registry: Arc::clone(&self.registry),
                    id,
                };
                self.deliver(record).await;
            }
        }
        true
    }

    /// Seal now and deliver on a background task.
    ///
    /// Used from `Drop` and body polling, where awaiting is not possible.
    pub fn finalize_detached(self: &Arc<Self>, ctx: &RequestHandle, completion: Completion) -> bool {
        let Some(record) = ctx.seal(completion) else {
            return false;
        };
        let id = ctx.id();

        match Handle::try_current() {
            Ok(runtime) => {
                self.spawn_delivery(&runtime, id, record);
            }
            Err(_) => {
                tracing::warn!(request_id = %id, "No runtime to deliver request record");
                self.registry.remove(&id);
            }
        }
        true
    }

    fn spawn_delivery(
        self: &Arc<Self>,
        runtime: &Handle,
        id: Uuid,
        record: IncomingRequestEvent,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let unregister = Unregister {
            registry: Arc::clone(&self.registry),
            id,
        };
        runtime.spawn(async move {
            let _unregister = unregister;
            this.deliver(record).await;
        })
    }

    async fn deliver(&self, record: IncomingRequestEvent) {
        if record.outcome == RequestOutcome::Abandoned {
            metrics::record_abandoned();
        }
        let request_id = record.request_id;

        match &self.delivery {
            Delivery::Direct(transmitter) => {
                if let Err(e) = transmitter.send(&[Event::Incoming(record)]).await {
                    tracing::warn!(request_id = %request_id, error = %e, "Request record discarded");
                }
            }
            Delivery::Buffered(buffer) => buffer.push(Event::Incoming(record)),
        }
    }
}
