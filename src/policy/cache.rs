//! Optional per-path policy cache.
//!
//! Disabled unless `policy_cache_ttl_ms` is non-zero. Entries are keyed on the
//! path without its query string and served until they are older than the
//! TTL, then refetched. At most `max_entries` paths are held; when full, stale
//! entries are purged and a new path that still finds no room is not cached.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::policy::types::Policy;

#[derive(Debug)]
pub struct PolicyCache {
    ttl: Duration,
    max_entries: usize,
    entries: DashMap<String, (Instant, Policy)>,
}

fn cache_key(path: &str) -> &str {
    path.split_once('?').map_or(path, |(route, _)| route)
}

impl PolicyCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, path: &str) -> Option<Policy> {
        let key = cache_key(path);
        let entry = self.entries.get(key)?;
        let (fetched_at, policy) = entry.value();
        if fetched_at.elapsed() < self.ttl {
            Some(policy.clone())
        } else {
            drop(entry);
            self.entries.remove(key);
            None
        }
    }

    pub fn insert(&self, path: &str, policy: Policy) {
        let key = cache_key(path);
        if !self.entries.contains_key(key) && self.entries.len() >= self.max_entries {
            let ttl = self.ttl;
            self.entries
                .retain(|_, (fetched_at, _)| fetched_at.elapsed() < ttl);
            if self.entries.len() >= self.max_entries {
                tracing::debug!(path = key, "Policy cache full; not caching");
                return;
            }
        }
        self.entries
            .insert(key.to_string(), (Instant::now(), policy));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_within_ttl() {
        let cache = PolicyCache::new(Duration::from_secs(60), 16);
        cache.insert("/a", Policy::default());
        assert_eq!(cache.get("/a"), Some(Policy::default()));
        assert!(cache.get("/b").is_none());
    }

    #[test]
    fn test_stale_entry_evicted() {
        let cache = PolicyCache::new(Duration::ZERO, 16);
        cache.insert("/a", Policy::default());
        assert!(cache.get("/a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_query_shares_the_path_entry() {
        let cache = PolicyCache::new(Duration::from_secs(60), 16);
        cache.insert("/ping?a=1", Policy::default());
        assert_eq!(cache.get("/ping?a=2"), Some(Policy::default()));
        assert_eq!(cache.get("/ping"), Some(Policy::default()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_full_cache_stops_growing() {
        let cache = PolicyCache::new(Duration::from_secs(60), 2);
        for i in 0..10 {
            cache.insert(&format!("/item/{i}"), Policy::default());
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.get("/item/0").is_some());
        assert!(cache.get("/item/9").is_none());

        // Existing paths still refresh.
        cache.insert("/item/1", Policy::default());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_full_cache_makes_room_from_stale_entries() {
        let cache = PolicyCache::new(Duration::ZERO, 2);
        cache.insert("/a", Policy::default());
        cache.insert("/b", Policy::default());
        cache.insert("/c", Policy::default());
        assert_eq!(cache.len(), 1);
    }
}
