// Origin server: the authoritative key-to-document oracle behind the
// proxy fleet. Documents live as JSON files under a local data directory.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::OriginConfig;
use crate::protocol::{self, ParseError, Request, Response, Status};

/// Serves `GET <resource>/<key>` by reading `<data_dir>/<resource><key>.json`
/// (no separator between resource and key) and returning its parsed JSON.
/// Same one-shot framing as every other hop.
pub struct OriginServer {
    listener: TcpListener,
    data_dir: PathBuf,
}

impl OriginServer {
    pub async fn bind(cfg: &OriginConfig) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(cfg.listen.addr())
            .await
            .with_context(|| format!("failed to bind origin listener on {}", cfg.listen.addr()))?;
        Ok(Arc::new(Self {
            listener,
            data_dir: cfg.data_dir.clone(),
        }))
    }

    pub fn port(&self) -> Result<u16> {
        Ok(self
            .listener
            .local_addr()
            .context("failed to resolve origin local address")?
            .port())
    }

    pub async fn serve(self: Arc<Self>, shutdown: CancellationToken) -> Result<()> {
        info!(
            component = "origin",
            event = "listening",
            data_dir = %self.data_dir.display(),
            "origin server accepting connections"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(component = "origin", event = "shutdown", "origin server stopped");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(component = "origin", event = "accept_failed", error = %e, "accept failed");
                            continue;
                        }
                    };
                    let origin = self.clone();
                    tokio::task::spawn(async move {
                        if let Err(e) = origin.handle_connection(stream).await {
                            warn!(
                                component = "origin",
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

    async fn handle_connection(&self, mut stream: TcpStream) -> io::Result<()> {
        let Some(raw) = protocol::read_request(&mut stream).await? else {
            return Ok(());
        };

        let response = match Request::parse_bytes(&raw) {
            Ok(Request::Get { resource, key }) => self.lookup(&resource, &key).await,
            Ok(Request::Metrics) => Response::new(
                Status::BadRequest,
                Value::from("origin serves only GET requests"),
            ),
            Err(ParseError::WrongMethod(verb)) => {
                let reason = format!("{} is not currently supported", verb);
                Response::new(Status::WrongMethod(verb), Value::from(reason))
            }
            Err(e) => Response::new(Status::BadRequest, Value::from(e.to_string())),
        };

        protocol::write_response(&mut stream, &response).await
    }

    /// Resource and key concatenate straight into the file name; an
    /// unknown or unreadable file is `NOT_FOUND`.
    async fn lookup(&self, resource: &str, key: &str) -> Response {
        let path = self.data_dir.join(format!("{}{}.json", resource, key));
        debug!(
            component = "origin",
            event = "lookup",
            path = %path.display(),
            "serving read"
        );

        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) => {
                return Response::new(
                    Status::NotFound,
                    Value::from(format!("no such resource: {}", e)),
                );
            }
        };

        match serde_json::from_slice::<Value>(&raw) {
            Ok(document) => Response::new(Status::Ok, document),
            Err(e) => Response::new(
                Status::NotFound,
                Value::from(format!("stored document is not valid JSON: {}", e)),
            ),
        }
    }
}
