//! Broker-less producer and consumer for tests and dry runs.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::event::{Event, NotificationMsg};

use super::{Consumer, Producer, TransportError, TransportResult};

/// Accepts every notification and keeps it for inspection.
#[derive(Debug, Clone, Default)]
pub struct DummyProducer {
    sent: Arc<Mutex<Vec<NotificationMsg>>>,
}

impl DummyProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains what has been "published" so far.
    pub fn take_sent(&self) -> Vec<NotificationMsg> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn sent_len(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl Producer for DummyProducer {
    async fn connect(&mut self) -> TransportResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> TransportResult<()> {
        Ok(())
    }

    async fn send_notification(&self, event: &Event) -> TransportResult<()> {
        let msg = NotificationMsg::from(event);
        debug!(event_id = msg.id, "dummy notification accepted");
        self.sent.lock().push(msg);
        Ok(())
    }
}

/// Consumer fed by a caller-owned channel.
#[derive(Debug)]
pub struct DummyConsumer {
    rx: Option<mpsc::Receiver<NotificationMsg>>,
}

impl DummyConsumer {
    pub fn new(rx: mpsc::Receiver<NotificationMsg>) -> Self {
        Self { rx: Some(rx) }
    }
}

#[async_trait]
impl Consumer for DummyConsumer {
    async fn connect(&mut self) -> TransportResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> TransportResult<()> {
        Ok(())
    }

    fn notify_channel(&mut self) -> TransportResult<mpsc::Receiver<NotificationMsg>> {
        self.rx.take().ok_or(TransportError::AlreadySubscribed)
    }
}
