//! Notification producer/consumer abstraction over a message queue.

pub mod dummy;
pub mod queue;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::event::{Event, NotificationMsg};

pub use dummy::{DummyConsumer, DummyProducer};
pub use queue::{QueueConsumer, QueueProducer, SqliteQueue};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,
    #[error("notify channel already taken")]
    AlreadySubscribed,
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("queue error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("transport task failed: {0}")]
    Task(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Outbound side: publishes one [`NotificationMsg`] per due event.
#[async_trait]
pub trait Producer: Send + Sync {
    async fn connect(&mut self) -> TransportResult<()>;
    async fn close(&mut self) -> TransportResult<()>;
    async fn send_notification(&self, event: &Event) -> TransportResult<()>;
}

/// Inbound side: delivers decoded messages on a single-slot channel.
#[async_trait]
pub trait Consumer: Send {
    async fn connect(&mut self) -> TransportResult<()>;
    async fn close(&mut self) -> TransportResult<()>;

    /// Hands out the receiving end of the notify channel. Only one caller
    /// gets it; later calls fail with [`TransportError::AlreadySubscribed`].
    fn notify_channel(&mut self) -> TransportResult<mpsc::Receiver<NotificationMsg>>;
}
