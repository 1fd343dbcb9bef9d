//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for Ctrl-C (SIGINT)
//! - Translate it into a shutdown trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A programmatic trigger ends the wait just like a signal

use crate::lifecycle::Shutdown;

/// Wait until Ctrl-C is received or `shutdown` is triggered.
pub async fn wait_for_shutdown(shutdown: &Shutdown) {
    let mut rx = shutdown.subscribe();
    // Subscribe first so a trigger between the check and the wait is not missed.
    if shutdown.is_triggered() {
        return;
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => {
                    tracing::info!("Ctrl-C received");
                    shutdown.trigger();
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for Ctrl-C, waiting for programmatic shutdown");
                    let _ = rx.recv().await;
                }
            }
        }
        _ = rx.recv() => {}
    }
}
