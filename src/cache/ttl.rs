// TTL cache engine: entries expire a fixed interval after their last write.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;

use super::CacheEngine;

/// Time-to-live cache. The TTL is a property of the cache, not of the
/// entry: a rewrite of an existing key extends its expiry. There is no
/// background sweeper; expired entries are dropped on the next lookup.
pub struct TtlCache {
    ttl: Duration,
    store: Mutex<HashMap<String, TtlEntry>>,
}

struct TtlEntry {
    value: Value,
    expires_at: Instant,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            store: Mutex::new(HashMap::new()),
        }
    }
}

impl CacheEngine for TtlCache {
    fn get(&self, key: &str) -> (Option<Value>, bool) {
        let mut store = self.store.lock();
        match store.get(key) {
            None => (None, false),
            Some(entry) if Instant::now() > entry.expires_at => {
                // Lazy expiry: removed under the same lock as the lookup.
                store.remove(key);
                (None, false)
            }
            Some(entry) => (Some(entry.value.clone()), true),
        }
    }

    fn set(&self, key: &str, value: Value) {
        let entry = TtlEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.store.lock().insert(key.to_string(), entry);
    }

    fn size(&self) -> usize {
        self.store.lock().len()
    }
}
