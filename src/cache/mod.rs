// Pluggable cache engines for the proxy read path.

pub mod lru;
pub mod ttl;

#[cfg(test)]
mod lru_test;
#[cfg(test)]
mod ttl_test;

pub use lru::LruCache;
pub use ttl::TtlCache;

use std::sync::Arc;

use serde_json::Value;

use crate::config::{CacheConfig, CacheKind};

/// Capability contract shared by both engines. Operations never touch
/// I/O and are serialized per engine instance; safe to share across
/// request handler tasks.
pub trait CacheEngine: Send + Sync {
    /// Looks up a key, returning the value and a hit flag.
    fn get(&self, key: &str) -> (Option<Value>, bool);

    /// Unconditionally stores a value under a key.
    fn set(&self, key: &str, value: Value);

    /// Number of currently stored entries.
    fn size(&self) -> usize;
}

/// Builds the engine selected by configuration. Constructed once at proxy
/// startup.
pub fn from_config(cfg: &CacheConfig) -> Arc<dyn CacheEngine> {
    match cfg.engine {
        CacheKind::Ttl => Arc::new(TtlCache::new(cfg.ttl)),
        CacheKind::Lru => Arc::new(LruCache::new(cfg.capacity)),
    }
}
