// Origin server entrypoint.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use cachefleet::config::FleetConfig;
use cachefleet::origin::OriginServer;
use cachefleet::{logging, shutdown};

/// CacheFleet origin - authoritative JSON document store
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

    let origin_cfg = cfg
        .origin
        .clone()
        .context("config has no `origin` section")?;

    let origin = OriginServer::bind(&origin_cfg).await?;
    info!(
        component = "main",
        event = "starting",
        addr = %origin_cfg.listen.addr(),
        "origin server starting"
    );

    let token = CancellationToken::new();
    let task = tokio::task::spawn(origin.serve(token.clone()));

    shutdown::run_until_shutdown(token, Duration::from_secs(10), task).await
}
