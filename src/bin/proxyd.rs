// Proxy node entrypoint.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use cachefleet::config::FleetConfig;
use cachefleet::proxy::ProxyNode;
use cachefleet::{logging, shutdown};

/// CacheFleet proxy node - caching front-end for the origin
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, value_name = "FILE")]
    cfg: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let cfg = FleetConfig::load_with_fallback(args.cfg)?;
    logging::init(&cfg);

    let proxy_cfg = cfg
        .proxy
        .clone()
        .context("config has no `proxy` section")?;
    proxy_cfg.validate().context("invalid proxy config")?;

    let node = ProxyNode::bind(&proxy_cfg).await?;
    info!(
        component = "main",
        event = "starting",
        addr = %proxy_cfg.listen.addr(),
        origin = %proxy_cfg.origin,
        "proxy node starting"
    );

    let token = CancellationToken::new();
    let task = tokio::task::spawn(node.serve(token.clone()));

    shutdown::run_until_shutdown(token, Duration::from_secs(10), task).await
}
