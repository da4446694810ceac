// Load balancer: dispatches client traffic across the proxy pool and
// tracks per-node health and metrics.

pub mod balancer;
pub mod picker;
pub mod poller;
pub mod registry;

#[cfg(test)]
mod picker_test;

pub use balancer::LoadBalancer;
pub use picker::ProxyPicker;
pub use poller::MetricsPoller;
pub use registry::{NodeHealth, NodeRegistry, MAX_FAILURES};

use dashmap::DashMap;
use serde_json::Value;

use crate::config::NodeAddr;

/// Last-known metrics snapshot per proxy. `None` marks a proxy whose most
/// recent poll failed or that has never been polled; a successful poll
/// replaces the slot wholesale.
pub type StatsMap = DashMap<NodeAddr, Option<Value>>;
