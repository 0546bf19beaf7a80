//! Timer-driven flush of the shared buffer (batched mode).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};

use crate::correlation::EventBuffer;
use crate::lifecycle::ShutdownSignal;
use crate::transmit::Transmitter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// A previous flush is still sending.
    Busy,
    /// Nothing buffered.
    Empty,
    Sent(usize),
    /// Delivery failed; the batch is back at the front of the buffer.
    Requeued(usize),
}

pub struct BatchFlusher {
    buffer: Arc<EventBuffer>,
    transmitter: Arc<Transmitter>,
    interval: Duration,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag however the flush ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl BatchFlusher {
    pub fn new(buffer: Arc<EventBuffer>, transmitter: Arc<Transmitter>, interval: Duration) -> Self {
        Self {
            buffer,
            transmitter,
            interval,
            in_flight: AtomicBool::new(false),
        }
    }

    pub async fn flush(&self) -> FlushOutcome {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return FlushOutcome::Busy;
        }
        let _guard = InFlight(&self.in_flight);

        if self.buffer.is_empty() {
            return FlushOutcome::Empty;
        }

        let batch = self.buffer.drain();
        let count = batch.len();
        match self.transmitter.send(&batch).await {
            Ok(()) => FlushOutcome::Sent(count),
            Err(_) => {
                self.buffer.requeue(batch);
                tracing::debug!(count, "Batch requeued for next flush");
                FlushOutcome::Requeued(count)
            }
        }
    }

    /// Flush every interval until shutdown, then once more.
    pub async fn run(self: Arc<Self>, mut shutdown: ShutdownSignal) {
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Batch flusher starting");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush().await;
                }
                _ = shutdown.wait() => {
                    tracing::info!("Batch flusher received shutdown signal, final flush");
                    self.flush().await;
                    break;
                }
            }
        }
    }
}
