// Node-health registry: per-proxy health driven by consecutive failures.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::NodeAddr;

/// Consecutive failures at which a node flips to unhealthy.
pub const MAX_FAILURES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHealth {
    pub healthy: bool,
    pub consecutive_failures: u32,
}

impl NodeHealth {
    fn new() -> Self {
        Self {
            healthy: true,
            consecutive_failures: 0,
        }
    }
}

/// Health records for the configured proxy pool. The pool itself is
/// immutable after startup; only the records change. The lock guards
/// trivial updates and is never held across I/O.
pub struct NodeRegistry {
    configured: Vec<NodeAddr>,
    nodes: Mutex<HashMap<NodeAddr, NodeHealth>>,
}

impl NodeRegistry {
    pub fn new(configured: Vec<NodeAddr>) -> Self {
        let nodes = configured
            .iter()
            .map(|addr| (addr.clone(), NodeHealth::new()))
            .collect();
        Self {
            configured,
            nodes: Mutex::new(nodes),
        }
    }

    /// Any success: the node is healthy and its failure streak resets.
    pub fn mark_healthy(&self, addr: &NodeAddr) {
        let mut nodes = self.nodes.lock();
        if let Some(health) = nodes.get_mut(addr) {
            if !health.healthy {
                info!(
                    component = "registry",
                    event = "node_recovered",
                    node = %addr,
                    "node marked healthy again"
                );
            }
            health.healthy = true;
            health.consecutive_failures = 0;
        }
    }

    /// One more consecutive failure; the health flag flips only once the
    /// streak reaches [`MAX_FAILURES`].
    pub fn mark_unhealthy(&self, addr: &NodeAddr) {
        let mut nodes = self.nodes.lock();
        if let Some(health) = nodes.get_mut(addr) {
            health.consecutive_failures += 1;
            if health.consecutive_failures >= MAX_FAILURES && health.healthy {
                health.healthy = false;
                warn!(
                    component = "registry",
                    event = "node_unhealthy",
                    node = %addr,
                    failures = health.consecutive_failures,
                    "node flipped unhealthy"
                );
            }
        }
    }

    pub fn is_healthy(&self, addr: &NodeAddr) -> bool {
        self.nodes
            .lock()
            .get(addr)
            .map(|health| health.healthy)
            .unwrap_or(false)
    }

    pub fn health(&self, addr: &NodeAddr) -> Option<NodeHealth> {
        self.nodes.lock().get(addr).cloned()
    }

    /// Healthy nodes in configured order. Fail-open: when every node is
    /// unhealthy, the full configured list is returned instead of nothing.
    pub fn get_healthy_nodes(&self) -> Vec<NodeAddr> {
        let nodes = self.nodes.lock();
        let healthy: Vec<NodeAddr> = self
            .configured
            .iter()
            .filter(|addr| nodes.get(*addr).map(|h| h.healthy).unwrap_or(false))
            .cloned()
            .collect();
        if healthy.is_empty() {
            self.configured.clone()
        } else {
            healthy
        }
    }

    pub fn get_all_nodes(&self) -> &[NodeAddr] {
        &self.configured
    }
}
