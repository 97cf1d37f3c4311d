//! Response Cache
//!
//! TTL cache of successful resolver results, keyed by path and parameters.

use crate::domain::value_objects::CacheKey;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// Node-local response cache.
///
/// Expired entries are never evicted in the background: they read as
/// misses and are overwritten by the next successful write to the same key.
/// The cache has no size bound; `clear` is the only way to shrink it.
pub struct ResponseCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached value for `key`, if present and not yet expired.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        if Instant::now() >= entry.expires_at {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Store `value` under `key` for one TTL, replacing whatever was there.
    pub fn insert(&self, key: CacheKey, value: Value) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.write().insert(key, entry);
    }

    pub fn clear(&self) {
        let removed = {
            let mut entries = self.entries.write();
            let n = entries.len();
            entries.clear();
            n
        };
        tracing::debug!("cache cleared, {} entries removed", removed);
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
