//! Short-TTL cache in front of the metrics read path.
//!
//! Entries are keyed per tenant and per query shape. Sync and aggregation
//! events invalidate a tenant's entries so readers never see stale data for
//! longer than one TTL after a write.

use lru::LruCache;
use serde_json::Value as JsonValue;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::CacheConfig;

/// Cache key: tenant plus the shape of the query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub tenant_id: Uuid,
    pub query: String,
}

impl CacheKey {
    pub fn new(tenant_id: Uuid, query: impl Into<String>) -> Self {
        Self {
            tenant_id,
            query: query.into(),
        }
    }
}

struct CacheEntry {
    value: JsonValue,
    inserted_at: Instant,
}

/// TTL-bounded LRU cache for computed metrics responses.
pub struct MetricsCache {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
    ttl: Duration,
}

impl MetricsCache {
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity.max(1)).unwrap();
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: Duration::from_secs(config.ttl_seconds),
        }
    }

    /// Fetch a live entry; expired entries are dropped on access.
    pub fn get(&self, key: &CacheKey) -> Option<JsonValue> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: CacheKey, value: JsonValue) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.put(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every cached entry belonging to one tenant.
    pub fn invalidate_tenant(&self, tenant_id: Uuid) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let stale: Vec<CacheKey> = entries
            .iter()
            .filter(|(key, _)| key.tenant_id == tenant_id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            entries.pop(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache(ttl_seconds: u64) -> MetricsCache {
        MetricsCache::new(&CacheConfig {
            ttl_seconds,
            capacity: 8,
        })
    }

    #[test]
    fn hit_within_ttl() {
        let cache = cache(60);
        let key = CacheKey::new(Uuid::new_v4(), "summary");
        cache.insert(key.clone(), json!({"total": 3}));
        assert_eq!(cache.get(&key), Some(json!({"total": 3})));
    }

    #[test]
    fn zero_ttl_expires_immediately() {
        let cache = cache(0);
        let key = CacheKey::new(Uuid::new_v4(), "summary");
        cache.insert(key.clone(), json!(1));
        assert_eq!(cache.get(&key), None);
    }

    #[test]
    fn invalidation_is_scoped_to_the_tenant() {
        let cache = cache(60);
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();
        let key_a = CacheKey::new(tenant_a, "summary");
        let key_a2 = CacheKey::new(tenant_a, "history");
        let key_b = CacheKey::new(tenant_b, "summary");
        cache.insert(key_a.clone(), json!(1));
        cache.insert(key_a2.clone(), json!(2));
        cache.insert(key_b.clone(), json!(3));

        cache.invalidate_tenant(tenant_a);

        assert_eq!(cache.get(&key_a), None);
        assert_eq!(cache.get(&key_a2), None);
        assert_eq!(cache.get(&key_b), Some(json!(3)));
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = MetricsCache::new(&CacheConfig {
            ttl_seconds: 60,
            capacity: 2,
        });
        let tenant = Uuid::new_v4();
        let k1 = CacheKey::new(tenant, "a");
        let k2 = CacheKey::new(tenant, "b");
        let k3 = CacheKey::new(tenant, "c");
        cache.insert(k1.clone(), json!(1));
        cache.insert(k2.clone(), json!(2));
        cache.insert(k3.clone(), json!(3));

        assert_eq!(cache.get(&k1), None);
        assert_eq!(cache.get(&k3), Some(json!(3)));
    }
}
