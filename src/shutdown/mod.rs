// Package shutdown turns OS signals into cancellation of the root scope.

use tokio::signal;
use tokio::signal::unix::{signal as unix_signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{Error, Result};

/// Waits for SIGINT/SIGTERM or for the scope to end by itself.
/// A signal cancels `shutdown_token`.
pub async fn listen(shutdown_token: CancellationToken) -> Result<()> {
    let mut term = unix_signal(SignalKind::terminate())
        .map_err(|e| Error::Source(format!("install SIGTERM handler: {e}")))?;

    tokio::select! {
        res = signal::ctrl_c() => {
            res.map_err(|e| Error::Source(format!("install SIGINT handler: {e}")))?;
            info!(
                component = "graceful-shutdown",
                event = "os_signal",
                signal = "SIGINT",
                "cancellation started"
            );
        }
        _ = term.recv() => {
            info!(
                component = "graceful-shutdown",
                event = "os_signal",
                signal = "SIGTERM",
                "cancellation started"
            );
        }
        _ = shutdown_token.cancelled() => {
            info!(
                component = "graceful-shutdown",
                event = "ctx_done",
                "cancellation started"
            );
            return Ok(());
        }
    }

    shutdown_token.cancel();
    Ok(())
}
