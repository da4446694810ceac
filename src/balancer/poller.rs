// Background metrics poller: the balancer's view of proxy health and load.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::NodeAddr;
use crate::protocol::{self, Request};

use super::registry::NodeRegistry;
use super::StatsMap;

/// Long-lived polling task. Each cycle sleeps for the configured
/// interval, then issues a `METRICS` request to every configured proxy in
/// order; cycles never overlap. A successful poll replaces the node's
/// snapshot and marks it healthy; any failure nulls the snapshot and
/// counts one unhealthy tick. Failures never end the loop.
pub struct MetricsPoller {
    interval: Duration,
    registry: Arc<NodeRegistry>,
    stats: Arc<StatsMap>,
}

impl MetricsPoller {
    pub fn new(interval: Duration, registry: Arc<NodeRegistry>, stats: Arc<StatsMap>) -> Self {
        Self {
            interval,
            registry,
            stats,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            component = "poller",
            event = "started",
            interval_ms = self.interval.as_millis() as u64,
            "metrics poller running"
        );
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(component = "poller", event = "shutdown", "metrics poller stopped");
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
            self.poll_cycle().await;
        }
    }

    /// One sequential pass over the configured pool.
    async fn poll_cycle(&self) {
        for addr in self.registry.get_all_nodes() {
            match self.request_metrics(addr).await {
                Some(snapshot) => {
                    self.stats.insert(addr.clone(), Some(snapshot));
                    self.registry.mark_healthy(addr);
                }
                None => {
                    self.stats.insert(addr.clone(), None);
                    self.registry.mark_unhealthy(addr);
                }
            }
        }
    }

    /// `Some(data)` only for a well-formed `OK` reply carrying a `data`
    /// field; everything else is a failed poll.
    async fn request_metrics(&self, addr: &NodeAddr) -> Option<Value> {
        let line = match protocol::exchange(&addr.to_string(), &Request::Metrics.to_line()).await {
            Ok(line) => line,
            Err(e) => {
                debug!(
                    component = "poller",
                    event = "poll_unreachable",
                    node = %addr,
                    error = %e,
                    "metrics poll failed"
                );
                return None;
            }
        };

        let reply: Value = match serde_json::from_str(&line) {
            Ok(reply) => reply,
            Err(e) => {
                debug!(
                    component = "poller",
                    event = "poll_reply_invalid",
                    node = %addr,
                    error = %e,
                    "metrics reply is not valid JSON"
                );
                return None;
            }
        };

        if reply.get("status").and_then(Value::as_str) != Some("OK") {
            return None;
        }
        reply.get("data").cloned()
    }
}
