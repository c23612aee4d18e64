//! Graceful shutdown utilities
//!
//! Services hand a [`CancellationToken`] to every long-running task; the token
//! is cancelled when the process receives Ctrl+C or SIGTERM.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Wait for shutdown signal (Ctrl+C, plus SIGTERM on Unix)
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Ctrl+C received"),
                    _ = term.recv() => info!("SIGTERM received"),
                }
            },
            Err(e) => {
                warn!("SIGTERM handler unavailable ({}), waiting for Ctrl+C only", e);
                let _ = tokio::signal::ctrl_c().await;
            },
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl+C received");
    }
}

/// Spawn a signal watcher and return the token it cancels
///
/// Must be called from inside a tokio runtime.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_shutdown() => trigger.cancel(),
            () = trigger.cancelled() => {},
        }
    });
    token
}
