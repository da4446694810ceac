// One-shot fleet client: issues a single GET or METRICS request and
// prints the JSON response.

use anyhow::Result;
use clap::Parser;

use cachefleet::client;
use cachefleet::protocol::Request;

/// CacheFleet client - send one request to a fleet endpoint
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Target host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Target port
    #[arg(long)]
    port: u16,

    /// Path to read, as `<resource>/<key>`
    #[arg(long, conflicts_with = "metrics")]
    get: Option<String>,

    /// Request a metrics snapshot instead of a read
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let request_line = match (&args.get, args.metrics) {
        (Some(path), false) => client::build_request(path),
        (None, true) => Request::Metrics.to_line(),
        _ => anyhow::bail!("pass exactly one of --get <resource>/<key> or --metrics"),
    };

    let addr = format!("{}:{}", args.host, args.port);
    let response = client::send_request(&addr, &request_line).await;
    println!("{}", response);

    Ok(())
}
