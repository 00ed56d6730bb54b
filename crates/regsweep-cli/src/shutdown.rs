//! Signal handling.
//!
//! The first SIGINT/SIGTERM asks running work to stop at the next safe
//! point; the second exits immediately with status 1.

use tokio::sync::watch;

/// Installs the signal handler and returns the shutdown flag.
pub fn install() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::warn!("Shutdown signal received, finishing the current repository");
        let _ = tx.send(true);

        wait_for_signal().await;
        tracing::warn!("Second shutdown signal received, exiting");
        std::process::exit(1);
    });

    rx
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Cannot listen for SIGTERM, only Ctrl+C is handled");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
