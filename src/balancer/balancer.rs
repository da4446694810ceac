// Load balancer server: accept loop, forward path, and the balancer's own
// metrics view.

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{BalancerConfig, NodeAddr};
use crate::protocol::{self, Response, Status, METRICS_COMMAND};

use super::picker::ProxyPicker;
use super::poller::MetricsPoller;
use super::registry::NodeRegistry;
use super::StatsMap;

/// The fleet's single entry point. Owns the immutable proxy pool, the
/// health registry, the last-known stats map, and the selection policy;
/// launches the metrics poller alongside its accept loop.
pub struct LoadBalancer {
    listener: TcpListener,
    registry: Arc<NodeRegistry>,
    stats: Arc<StatsMap>,
    picker: ProxyPicker,
    cfg: BalancerConfig,
}

impl LoadBalancer {
    pub async fn bind(cfg: &BalancerConfig) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(cfg.listen.addr())
            .await
            .with_context(|| format!("failed to bind balancer listener on {}", cfg.listen.addr()))?;

        let registry = Arc::new(NodeRegistry::new(cfg.proxies.clone()));
        let stats = Arc::new(StatsMap::new());
        for addr in &cfg.proxies {
            stats.insert(addr.clone(), None);
        }
        let picker = ProxyPicker::new(cfg.strategy, registry.clone(), stats.clone());

        Ok(Arc::new(Self {
            listener,
            registry,
            stats,
            picker,
            cfg: cfg.clone(),
        }))
    }

    pub fn port(&self) -> Result<u16> {
        Ok(self
            .listener
            .local_addr()
            .context("failed to resolve balancer local address")?
            .port())
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> &Arc<StatsMap> {
        &self.stats
    }

    /// Accept loop plus the background poller; both stop on cancellation.
    pub async fn serve(self: Arc<Self>, shutdown: CancellationToken) -> Result<()> {
        info!(
            component = "balancer",
            event = "listening",
            addr = %self.cfg.listen.addr(),
            strategy = %self.cfg.strategy,
            proxies = self.cfg.proxies.len(),
            "load balancer accepting connections"
        );

        let poller = MetricsPoller::new(
            self.cfg.poll_interval,
            self.registry.clone(),
            self.stats.clone(),
        );
        tokio::task::spawn(poller.run(shutdown.clone()));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(component = "balancer", event = "shutdown", "load balancer stopped");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(component = "balancer", event = "accept_failed", error = %e, "accept failed");
                            continue;
                        }
                    };
                    let balancer = self.clone();
                    tokio::task::spawn(async move {
                        if let Err(e) = balancer.handle_client(stream).await {
                            warn!(
                                component = "balancer",
                                event = "connection_failed",
                                peer = %peer,
                                error = %e,
                                "connection handler failed"
                            );
                        }
                    });
                }
            }
        }
    }

    async fn handle_client(&self, mut stream: TcpStream) -> io::Result<()> {
        let Some(raw) = protocol::read_request(&mut stream).await? else {
            return Ok(());
        };

        // The request is relayed as-is; re-frame it as trimmed-plus-newline.
        let trimmed = String::from_utf8_lossy(&raw).trim().to_string();
        if trimmed == METRICS_COMMAND {
            let response = self.metrics_view();
            return protocol::write_response(&mut stream, &response).await;
        }
        let request_line = format!("{}\n", trimmed);

        let Some(proxy) = self.picker.pick() else {
            let response = Response::new(Status::ProxyError, Value::Null);
            return protocol::write_response(&mut stream, &response).await;
        };

        let relayed = self.forward(&proxy, &request_line).await?;
        stream.write_all(relayed.as_bytes()).await
    }

    /// Forwards one request line to the picked proxy and returns the line
    /// to relay to the client, newline-terminated. A transport or parse
    /// failure yields a `PROXY_UNREACHABLE` line and one unhealthy tick;
    /// a valid JSON reply is relayed byte-for-byte and marks the proxy
    /// healthy.
    async fn forward(&self, proxy: &NodeAddr, request_line: &str) -> io::Result<String> {
        let line = match protocol::exchange(&proxy.to_string(), request_line).await {
            Ok(line) => line,
            Err(e) => {
                self.registry.mark_unhealthy(proxy);
                warn!(
                    component = "balancer",
                    event = "proxy_unreachable",
                    node = %proxy,
                    error = %e,
                    "forward failed"
                );
                return unreachable_line(e.to_string());
            }
        };

        if let Err(e) = serde_json::from_str::<Value>(&line) {
            self.registry.mark_unhealthy(proxy);
            warn!(
                component = "balancer",
                event = "proxy_reply_invalid",
                node = %proxy,
                error = %e,
                "proxy reply is not valid JSON"
            );
            return unreachable_line(e.to_string());
        }

        self.registry.mark_healthy(proxy);
        Ok(format!("{}\n", line))
    }

    /// The balancer's own `METRICS` answer: strategy, round-robin cursor,
    /// and per-proxy health plus last-known snapshot.
    fn metrics_view(&self) -> Response {
        let mut proxies = serde_json::Map::new();
        for addr in self.registry.get_all_nodes() {
            let snapshot = self
                .stats
                .get(addr)
                .and_then(|slot| slot.value().clone())
                .unwrap_or(Value::Null);
            proxies.insert(
                addr.to_string(),
                json!({
                    "healthy": self.registry.is_healthy(addr),
                    "metrics": snapshot,
                }),
            );
        }

        Response::new(
            Status::Ok,
            json!({
                "strategy": self.picker.strategy().to_string(),
                "current_index": self.picker.cursor(),
                "proxies": Value::Object(proxies),
            }),
        )
    }
}

fn unreachable_line(reason: String) -> io::Result<String> {
    Response::new(Status::ProxyUnreachable, Value::from(reason))
        .to_line()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
