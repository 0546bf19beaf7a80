//! Shared event buffer for batched mode.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::events::Event;
use crate::observability::metrics;

/// Ordered events waiting for the next flush.
#[derive(Debug, Default)]
pub struct EventBuffer {
    events: Mutex<VecDeque<Event>>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: Event) {
        let depth = {
            let mut events = self.events.lock();
            events.push_back(event);
            events.len()
        };
        metrics::record_buffer_depth(depth);
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Take everything currently buffered.
    pub fn drain(&self) -> Vec<Event> {
        let drained: Vec<Event> = self.events.lock().drain(..).collect();
        metrics::record_buffer_depth(0);
        drained
    }

    /// Put a failed batch back in front of anything appended since it was drained.
    pub fn requeue(&self, batch: Vec<Event>) {
        let depth = {
            let mut events = self.events.lock();
            for event in batch.into_iter().rev() {
                events.push_front(event);
            }
            events.len()
        };
        metrics::record_buffer_depth(depth);
    }
}
