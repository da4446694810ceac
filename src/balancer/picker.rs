// Proxy selection: round-robin and least-loaded over the healthy pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::config::{NodeAddr, Strategy};

use super::registry::NodeRegistry;
use super::StatsMap;

/// Picks the proxy for the next forward. Selection never blocks on I/O:
/// it reads a point-in-time view of the health registry and the stats
/// map, and the round-robin cursor is a single atomic fetch-add.
pub struct ProxyPicker {
    strategy: Strategy,
    cursor: AtomicU64,
    registry: Arc<NodeRegistry>,
    stats: Arc<StatsMap>,
}

impl ProxyPicker {
    pub fn new(strategy: Strategy, registry: Arc<NodeRegistry>, stats: Arc<StatsMap>) -> Self {
        Self {
            strategy,
            cursor: AtomicU64::new(0),
            registry,
            stats,
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Monotonic round-robin cursor; counts every round-robin pick ever
    /// made and is never reset when the candidate list changes.
    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::Relaxed)
    }

    /// `None` only when the configured pool is empty. Candidates are the
    /// healthy nodes, falling back to the whole pool (fail-open).
    pub fn pick(&self) -> Option<NodeAddr> {
        let candidates = self.registry.get_healthy_nodes();
        if candidates.is_empty() {
            return None;
        }

        match self.strategy {
            Strategy::RoundRobin => {
                let cursor = self.cursor.fetch_add(1, Ordering::Relaxed);
                let idx = (cursor % candidates.len() as u64) as usize;
                Some(candidates[idx].clone())
            }
            Strategy::LeastLoaded => candidates
                .iter()
                .min_by_key(|addr| self.last_known_load(addr))
                .cloned(),
        }
    }

    /// `total_requests` from the last-known snapshot; a missing or failed
    /// snapshot counts as zero, so never-yet-polled nodes are preferred.
    fn last_known_load(&self, addr: &NodeAddr) -> u64 {
        self.stats
            .get(addr)
            .and_then(|slot| {
                slot.value()
                    .as_ref()
                    .and_then(|snapshot| snapshot.get("total_requests"))
                    .and_then(Value::as_u64)
            })
            .unwrap_or(0)
    }
}
