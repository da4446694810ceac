// Upstream seam: how a proxy node reaches the origin on a cache miss.

use serde_json::Value;
use tracing::debug;

use crate::config::NodeAddr;
use crate::protocol;

/// Outcome of one origin fetch. Connection failures, unparsable replies
/// and unknown statuses all collapse into `Failure`.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Ok(Value),
    NotFound,
    Failure,
}

/// Authoritative data source for cache misses. A trait so tests can stand
/// in for the network.
#[async_trait::async_trait]
pub trait Upstream: Send + Sync {
    /// Fetches the document for a canonical `resource/key`.
    async fn fetch(&self, cache_key: &str) -> FetchOutcome;
}

/// TCP origin client speaking the shared line protocol. One fresh
/// connection per fetch, closed before returning. Fetches are not
/// coalesced: concurrent misses on one key each reach the origin, and the
/// last writer wins in the cache.
pub struct OriginBackend {
    addr: String,
}

impl OriginBackend {
    pub fn new(origin: NodeAddr) -> Self {
        Self {
            addr: origin.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Upstream for OriginBackend {
    async fn fetch(&self, cache_key: &str) -> FetchOutcome {
        let request = format!("GET {}\n", cache_key);
        let line = match protocol::exchange(&self.addr, &request).await {
            Ok(line) => line,
            Err(e) => {
                debug!(
                    component = "upstream",
                    event = "origin_unreachable",
                    origin = %self.addr,
                    error = %e,
                    "origin fetch failed"
                );
                return FetchOutcome::Failure;
            }
        };

        let reply: Value = match serde_json::from_str(&line) {
            Ok(reply) => reply,
            Err(e) => {
                debug!(
                    component = "upstream",
                    event = "origin_reply_invalid",
                    origin = %self.addr,
                    error = %e,
                    "origin reply is not valid JSON"
                );
                return FetchOutcome::Failure;
            }
        };

        match reply.get("status").and_then(Value::as_str) {
            Some("OK") => {
                let data = reply.get("data").cloned().unwrap_or(Value::Null);
                FetchOutcome::Ok(data)
            }
            Some("NOT_FOUND") => FetchOutcome::NotFound,
            _ => FetchOutcome::Failure,
        }
    }
}
