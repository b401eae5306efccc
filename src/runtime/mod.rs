//! Long-running loops and process shutdown plumbing.

/// Periodic notification dispatch and stale-event purge.
pub mod scheduler;
/// Notification consumer that acknowledges delivered events.
pub mod sender;

use tokio::sync::watch;
use tracing::{error, info};

pub use scheduler::{Scheduler, SchedulerError, TickReport};
pub use sender::{Sender, SenderError};

/// Resolves on SIGINT or SIGTERM (ctrl-c only on non-unix targets).
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                error!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}

/// Spawns a listener for [`shutdown_signal`] and returns a receiver that
/// flips to `true` once it fires.
pub fn shutdown_channel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = tx.send(true);
    });
    rx
}

/// Resolves once `rx` reads `true`. A dropped sender can never request a
/// stop, so in that case this never resolves and the loop keeps running.
pub(crate) async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
