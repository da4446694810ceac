// Test harness: boots fleet components on ephemeral ports.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::balancer::LoadBalancer;
use crate::client;
use crate::config::{BalancerConfig, CacheConfig, CacheKind, Listen, NodeAddr, OriginConfig, ProxyConfig, Strategy};
use crate::origin::OriginServer;
use crate::proxy::ProxyNode;

static DIR_SEQ: AtomicU64 = AtomicU64::new(0);

/// Cancels every component started with its token when the test ends.
pub struct ShutdownGuard(pub CancellationToken);

impl ShutdownGuard {
    pub fn new() -> Self {
        Self(CancellationToken::new())
    }

    pub fn token(&self) -> CancellationToken {
        self.0.clone()
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// A per-test origin data directory, removed on drop.
pub struct TempDataDir {
    path: PathBuf,
}

impl TempDataDir {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!(
            "cachefleet-test-{}-{}",
            std::process::id(),
            DIR_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `<file_stem>.json`; the origin resolves `GET res/key` to the
    /// stem `<res><key>`.
    pub fn write_document(&self, file_stem: &str, doc: &Value) {
        let path = self.path.join(format!("{}.json", file_stem));
        std::fs::write(path, serde_json::to_vec(doc).unwrap()).unwrap();
    }
}

impl Drop for TempDataDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

fn ephemeral_listen() -> Listen {
    Listen {
        host: "127.0.0.1".to_string(),
        port: 0,
    }
}

pub fn ttl_cache(ttl: Duration) -> CacheConfig {
    CacheConfig {
        engine: CacheKind::Ttl,
        ttl,
        capacity: 128,
    }
}

pub fn lru_cache(capacity: usize) -> CacheConfig {
    CacheConfig {
        engine: CacheKind::Lru,
        ttl: Duration::from_secs(30),
        capacity,
    }
}

pub async fn start_origin(token: &CancellationToken, data_dir: &Path) -> NodeAddr {
    let origin = OriginServer::bind(&OriginConfig {
        listen: ephemeral_listen(),
        data_dir: data_dir.to_path_buf(),
    })
    .await
    .unwrap();
    let port = origin.port().unwrap();
    tokio::task::spawn(origin.serve(token.clone()));
    NodeAddr::new("127.0.0.1", port)
}

pub async fn start_proxy(
    token: &CancellationToken,
    origin: NodeAddr,
    cache: CacheConfig,
) -> Arc<ProxyNode> {
    let node = ProxyNode::bind(&ProxyConfig {
        listen: ephemeral_listen(),
        origin,
        cache,
    })
    .await
    .unwrap();
    tokio::task::spawn(node.clone().serve(token.clone()));
    node
}

pub async fn start_balancer(
    token: &CancellationToken,
    proxies: Vec<NodeAddr>,
    strategy: Strategy,
    poll_interval: Duration,
) -> (Arc<LoadBalancer>, NodeAddr) {
    let balancer = LoadBalancer::bind(&BalancerConfig {
        listen: ephemeral_listen(),
        proxies,
        strategy,
        poll_interval,
    })
    .await
    .unwrap();
    let port = balancer.port().unwrap();
    tokio::task::spawn(balancer.clone().serve(token.clone()));
    (balancer, NodeAddr::new("127.0.0.1", port))
}

pub fn proxy_addr(node: &ProxyNode) -> NodeAddr {
    NodeAddr::new("127.0.0.1", node.port())
}

/// An address nothing listens on: bound, resolved, and released.
pub async fn unused_addr() -> NodeAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    NodeAddr::new("127.0.0.1", port)
}

pub async fn request(addr: &NodeAddr, line: &str) -> Value {
    client::send_request(&addr.to_string(), line).await
}
