// Proxy node server: accept loop, request dispatch, and the cache-or-origin
// read path.

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::CacheEngine;
use crate::config::ProxyConfig;
use crate::metrics::ProxyMetrics;
use crate::protocol::{self, ParseError, Request, Response, Status};

use super::upstream::{FetchOutcome, OriginBackend, Upstream};

/// A proxy node: one bound listener, one cache engine, one metrics
/// counter, one origin client. Every accepted connection runs on its own
/// task; the cache serializes its own mutations.
pub struct ProxyNode {
    listener: TcpListener,
    port: u16,
    cache: Arc<dyn CacheEngine>,
    metrics: Arc<ProxyMetrics>,
    upstream: Arc<dyn Upstream>,
}

impl ProxyNode {
    /// Binds a node configured from the fleet config: cache engine from
    /// the `cache` section, origin client from the `origin` endpoint.
    pub async fn bind(cfg: &ProxyConfig) -> Result<Arc<Self>> {
        let cache = crate::cache::from_config(&cfg.cache);
        let upstream = Arc::new(OriginBackend::new(cfg.origin.clone()));
        Self::bind_with(&cfg.listen.addr(), cache, upstream).await
    }

    /// Binds a node with injected cache and upstream.
    pub async fn bind_with(
        addr: &str,
        cache: Arc<dyn CacheEngine>,
        upstream: Arc<dyn Upstream>,
    ) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind proxy listener on {}", addr))?;
        let port = listener
            .local_addr()
            .context("failed to resolve proxy local address")?
            .port();

        Ok(Arc::new(Self {
            listener,
            port,
            cache,
            metrics: Arc::new(ProxyMetrics::new()),
            upstream,
        }))
    }

    /// The actually bound port; also stamped into every response.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn cache(&self) -> &Arc<dyn CacheEngine> {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<ProxyMetrics> {
        &self.metrics
    }

    /// Accept loop; runs until the token is cancelled.
    pub async fn serve(self: Arc<Self>, shutdown: CancellationToken) -> Result<()> {
        info!(
            component = "proxy",
            event = "listening",
            port = self.port,
            "proxy node accepting connections"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(component = "proxy", event = "shutdown", port = self.port, "proxy node stopped");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(component = "proxy", event = "accept_failed", error = %e, "accept failed");
                            continue;
                        }
                    };
                    let node = self.clone();
                    tokio::task::spawn(async move {
                        if let Err(e) = node.handle_connection(stream).await {
                            warn!(
                                component = "proxy",
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

    /// One request, one response, then the connection closes.
    async fn handle_connection(&self, mut stream: TcpStream) -> io::Result<()> {
        let Some(raw) = protocol::read_request(&mut stream).await? else {
            return Ok(());
        };

        let request = match Request::parse_bytes(&raw) {
            Ok(request) => request,
            Err(ParseError::WrongMethod(verb)) => {
                let response =
                    Response::proxied(Status::WrongMethod(verb), Value::from(""), false, self.port);
                return protocol::write_response(&mut stream, &response).await;
            }
            Err(e) => {
                // Rejected before any counter is touched.
                let response = Response::proxied(
                    Status::BadRequest,
                    Value::from(e.to_string()),
                    false,
                    self.port,
                );
                return protocol::write_response(&mut stream, &response).await;
            }
        };

        match request {
            Request::Metrics => {
                let snapshot = serde_json::to_value(self.metrics.snapshot())
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                let response = Response::new(Status::Ok, snapshot);
                protocol::write_response(&mut stream, &response).await
            }
            Request::Get { resource, key } => {
                let cache_key = format!("{}/{}", resource, key);
                let response = self.serve_get(&cache_key).await;
                protocol::write_response(&mut stream, &response).await
            }
        }
    }

    /// The read path: `total_requests` first, then exactly one of
    /// hit/miss, then on a miss an origin fetch counted regardless of its
    /// outcome.
    async fn serve_get(&self, cache_key: &str) -> Response {
        self.metrics.record_request();

        let (value, found) = self.cache.get(cache_key);
        if found {
            self.metrics.record_hit();
            let data = value.unwrap_or(Value::Null);
            return Response::proxied(Status::Ok, data, true, self.port);
        }

        self.metrics.record_miss();
        self.metrics.record_origin_fetch();

        match self.upstream.fetch(cache_key).await {
            FetchOutcome::Ok(data) => {
                self.cache.set(cache_key, data.clone());
                Response::proxied(Status::Ok, data, false, self.port)
            }
            FetchOutcome::NotFound => {
                Response::proxied(Status::NotFound, Value::Null, false, self.port)
            }
            FetchOutcome::Failure => {
                Response::proxied(Status::OriginFailure, Value::Null, false, self.port)
            }
        }
    }
}
