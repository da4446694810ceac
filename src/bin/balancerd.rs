// Load balancer entrypoint.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use cachefleet::balancer::LoadBalancer;
use cachefleet::config::FleetConfig;
use cachefleet::{logging, shutdown};

/// CacheFleet load balancer - entry point for the proxy pool
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

    let balancer_cfg = cfg
        .balancer
        .clone()
        .context("config has no `balancer` section")?;

    let balancer = LoadBalancer::bind(&balancer_cfg).await?;
    info!(
        component = "main",
        event = "starting",
        addr = %balancer_cfg.listen.addr(),
        strategy = %balancer_cfg.strategy,
        "load balancer starting"
    );

    let token = CancellationToken::new();
    let task = tokio::task::spawn(balancer.serve(token.clone()));

    shutdown::run_until_shutdown(token, Duration::from_secs(10), task).await
}
