// Cooperative shutdown for the fleet binaries.

use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
#[error("graceful shutdown timeout exceeded")]
pub struct TimeoutError;

/// Runs a server task until ctrl-c or external cancellation, then cancels
/// the token and gives the task a bounded window to drain. If the task
/// finishes on its own first (for example a fatal accept-loop error), its
/// result is returned directly.
pub async fn run_until_shutdown(
    token: CancellationToken,
    grace: Duration,
    mut task: JoinHandle<Result<()>>,
) -> Result<()> {
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!(
                component = "shutdown",
                event = "os_signal",
                signal = "SIGINT",
                "cancellation started"
            );
        }
        _ = token.cancelled() => {
            info!(
                component = "shutdown",
                event = "ctx_done",
                "cancellation started"
            );
        }
        result = &mut task => {
            return flatten(result);
        }
    }

    token.cancel();

    match timeout(grace, &mut task).await {
        Ok(result) => {
            info!(
                component = "shutdown",
                event = "shutdown_success",
                "service was gracefully shut down"
            );
            flatten(result)
        }
        Err(_) => {
            warn!(
                component = "shutdown",
                event = "shutdown_timeout",
                timeout_secs = grace.as_secs(),
                "task did not stop within timeout"
            );
            task.abort();
            Err(TimeoutError.into())
        }
    }
}

fn flatten(result: Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    match result {
        Ok(inner) => inner,
        Err(e) => Err(anyhow::anyhow!("server task failed: {}", e)),
    }
}
