use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{
    storage::Storage,
    transport::{Consumer, TransportError},
};

use super::stop_requested;

#[derive(Debug, thiserror::Error)]
pub enum SenderError {
    #[error("consumer error: {0}")]
    Transport(#[from] TransportError),
}

/// Consumes notification messages and marks their events as notified.
pub struct Sender {
    storage: Arc<dyn Storage>,
    consumer: Box<dyn Consumer>,
}

impl Sender {
    pub fn new(storage: Arc<dyn Storage>, consumer: Box<dyn Consumer>) -> Self {
        Self { storage, consumer }
    }

    /// Processes messages one at a time until the notify channel closes or
    /// `shutdown` reads `true`, then closes the consumer and the storage.
    /// Dropping the shutdown sender does not stop the loop.
    ///
    /// A failed acknowledgement is logged and skipped. Returns the number of
    /// events marked as notified.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<u64, SenderError> {
        let mut rx = self.consumer.notify_channel()?;
        let storage = Arc::clone(&self.storage);
        let mut acked = 0u64;
        info!("sender started");

        loop {
            tokio::select! {
                biased;
                _ = stop_requested(&mut shutdown) => {
                    info!("sender shutdown requested");
                    break;
                }
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        info!("notify channel closed");
                        break;
                    };
                    match storage.mark_notified(msg.id).await {
                        Ok(()) => {
                            acked += 1;
                            info!(event_id = msg.id, user_id = msg.user_id, title = %msg.title, "event notified");
                        }
                        Err(err) => {
                            error!(event_id = msg.id, error = %err, "failed to mark event notified");
                        }
                    }
                }
            }
        }

        drop(rx);
        drop(storage);
        self.stop().await;
        Ok(acked)
    }

    async fn stop(&mut self) {
        if let Err(err) = self.consumer.close().await {
            warn!(error = %err, "failed to close consumer");
        } else {
            debug!("consumer closed");
        }
        if let Err(err) = self.storage.close().await {
            warn!(error = %err, "failed to close storage");
        } else {
            debug!("storage closed");
        }
    }
}
