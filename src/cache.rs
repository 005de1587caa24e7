//! Read-through cache owned by the service layer. The engine never consults
//! it; anything cached here can always be recomputed from storage.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;

pub trait SummaryCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value, ttl: Duration);
    fn invalidate(&self, key: &str);
}

pub fn pool_summary_key(pool_id: &str) -> String {
    format!("pool_summary:{pool_id}")
}

pub fn user_pools_key(user_id: &str) -> String {
    format!("user_pools:{user_id}")
}

#[derive(Default)]
pub struct InMemoryCache {
    entries: DashMap<String, (Value, Instant)>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SummaryCache for InMemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let hit = self.entries.get(key).and_then(|entry| {
            let (value, expires_at) = entry.value();
            (Instant::now() < *expires_at).then(|| value.clone())
        });
        if hit.is_none() {
            self.entries
                .remove_if(key, |_, (_, expires_at)| Instant::now() >= *expires_at);
        } else {
            tracing::debug!(key, "cache hit");
        }
        hit
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) {
        self.entries
            .insert(key.to_string(), (value, Instant::now() + ttl));
    }

    fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }
}

/// Cache that never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl SummaryCache for NoopCache {
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn set(&self, _key: &str, _value: Value, _ttl: Duration) {}

    fn invalidate(&self, _key: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stores_until_invalidated() {
        let cache = InMemoryCache::new();
        let key = pool_summary_key("trip");
        cache.set(&key, json!({"member_count": 3}), Duration::from_secs(60));
        assert_eq!(cache.get(&key), Some(json!({"member_count": 3})));

        cache.invalidate(&key);
        assert_eq!(cache.get(&key), None);
    }

    #[test]
    fn expired_entries_miss() {
        let cache = InMemoryCache::new();
        cache.set("k", json!(1), Duration::ZERO);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn noop_cache_always_misses() {
        let cache = NoopCache;
        cache.set("k", json!(1), Duration::from_secs(60));
        assert_eq!(cache.get("k"), None);
    }
}
