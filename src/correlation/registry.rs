//! Registry of open request contexts.
//!
//! Only used to find contexts that outlived their TTL. Attribution never walks
//! this map.

use std::time::Duration;

use dashmap::DashMap;
use uuid::Uuid;

use crate::correlation::context::RequestHandle;
use crate::observability::metrics;

#[derive(Debug, Default)]
pub struct ContextRegistry {
    open: DashMap<Uuid, RequestHandle>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: RequestHandle) {
        self.open.insert(handle.id(), handle);
        metrics::record_open_contexts(self.open.len());
    }

    pub fn remove(&self, id: &Uuid) {
        self.open.remove(id);
        metrics::record_open_contexts(self.open.len());
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.open.contains_key(id)
    }

    /// Contexts older than `ttl`. They stay registered until finalized.
    pub fn expired(&self, ttl: Duration) -> Vec<RequestHandle> {
        self.open
            .iter()
            .filter(|entry| entry.value().age() >= ttl)
            .map(|entry| entry.value().clone())
            .collect()
    }
}
