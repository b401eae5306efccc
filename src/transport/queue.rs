//! Durable SQLite-backed message queue.
//!
//! Producers append JSON rows; a consumer polls the oldest row, hands it to
//! the notify channel and deletes it only afterwards, so a crash between the
//! two steps redelivers rather than loses the message.

use std::{path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tokio::{
    sync::{Mutex, mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, error, warn};

use crate::{
    event::{Event, NotificationMsg},
    types::NOTIFICATION_QUEUE,
};

use super::{Consumer, Producer, TransportError, TransportResult};

const QUEUE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS messages (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    queue        TEXT    NOT NULL,
    payload      BLOB    NOT NULL,
    published_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS messages_queue_seq ON messages(queue, seq);
";

/// One stored, not yet acknowledged message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub seq: i64,
    pub payload: Vec<u8>,
}

/// Shared handle to a queue database. Clones share one connection.
#[derive(Clone)]
pub struct SqliteQueue {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteQueue {
    pub fn open(path: impl Into<PathBuf>) -> TransportResult<Self> {
        let conn = Connection::open(path.into())?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init_connection(conn)
    }

    pub fn open_in_memory() -> TransportResult<Self> {
        Self::init_connection(Connection::open_in_memory()?)
    }

    fn init_connection(conn: Connection) -> TransportResult<Self> {
        conn.execute_batch(QUEUE_SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Appends `msg` to `queue` and returns its sequence number.
    pub async fn publish(&self, queue: &str, msg: &NotificationMsg) -> TransportResult<i64> {
        let payload = serde_json::to_vec(msg)?;
        let queue = queue.to_string();
        self.run_blocking(move |conn| {
            conn.execute(
                "INSERT INTO messages(queue, payload, published_at) VALUES (?1, ?2, ?3)",
                params![queue, payload, Utc::now().timestamp_millis()],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Oldest unacknowledged message of `queue`, left in place.
    pub async fn peek(&self, queue: &str) -> TransportResult<Option<QueuedMessage>> {
        let queue = queue.to_string();
        self.run_blocking(move |conn| {
            let row = conn
                .query_row(
                    "SELECT seq, payload FROM messages WHERE queue = ?1 ORDER BY seq ASC LIMIT 1",
                    params![queue],
                    |row| {
                        Ok(QueuedMessage {
                            seq: row.get(0)?,
                            payload: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
        .await
    }

    pub async fn ack(&self, seq: i64) -> TransportResult<()> {
        self.run_blocking(move |conn| {
            conn.execute("DELETE FROM messages WHERE seq = ?1", params![seq])?;
            Ok(())
        })
        .await
    }

    /// Number of messages waiting in `queue`.
    pub async fn depth(&self, queue: &str) -> TransportResult<usize> {
        let queue = queue.to_string();
        self.run_blocking(move |conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE queue = ?1",
                params![queue],
                |row| row.get(0),
            )?;
            Ok(n as usize)
        })
        .await
    }

    async fn run_blocking<T, F>(&self, f: F) -> TransportResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> TransportResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn)
        })
        .await
        .map_err(|e| TransportError::Task(format!("join error: {e}")))?
    }
}

/// Publishes notifications to the `notification` queue.
pub struct QueueProducer {
    url: String,
    queue: Option<SqliteQueue>,
}

impl QueueProducer {
    /// `url` is the queue database path, opened on [`Producer::connect`].
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            queue: None,
        }
    }

    /// Producer over an already opened queue; `connect` becomes a no-op.
    pub fn with_queue(queue: SqliteQueue) -> Self {
        Self {
            url: String::new(),
            queue: Some(queue),
        }
    }
}

#[async_trait]
impl Producer for QueueProducer {
    async fn connect(&mut self) -> TransportResult<()> {
        if self.queue.is_some() {
            return Ok(());
        }
        debug!(url = %self.url, "connecting producer to queue");
        self.queue = Some(open_queue(&self.url).await?);
        Ok(())
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.queue = None;
        Ok(())
    }

    async fn send_notification(&self, event: &Event) -> TransportResult<()> {
        let queue = self.queue.as_ref().ok_or(TransportError::NotConnected)?;
        let msg = NotificationMsg::from(event);
        let seq = queue.publish(NOTIFICATION_QUEUE, &msg).await?;
        debug!(event_id = msg.id, seq, "notification published");
        Ok(())
    }
}

/// Polls the `notification` queue and forwards decoded messages to a
/// single-slot channel.
pub struct QueueConsumer {
    url: String,
    poll_interval: Duration,
    queue: Option<SqliteQueue>,
    notify_tx: Option<mpsc::Sender<NotificationMsg>>,
    notify_rx: Option<mpsc::Receiver<NotificationMsg>>,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl QueueConsumer {
    pub fn new(url: impl Into<String>, poll_interval: Duration) -> Self {
        let (notify_tx, notify_rx) = mpsc::channel(1);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            url: url.into(),
            poll_interval,
            queue: None,
            notify_tx: Some(notify_tx),
            notify_rx: Some(notify_rx),
            shutdown_tx,
            task: None,
        }
    }

    pub fn with_queue(queue: SqliteQueue, poll_interval: Duration) -> Self {
        let mut consumer = Self::new(String::new(), poll_interval);
        consumer.queue = Some(queue);
        consumer
    }
}

#[async_trait]
impl Consumer for QueueConsumer {
    async fn connect(&mut self) -> TransportResult<()> {
        if self.task.is_some() {
            return Ok(());
        }
        let queue = match self.queue.clone() {
            Some(queue) => queue,
            None => {
                debug!(url = %self.url, "connecting consumer to queue");
                let queue = open_queue(&self.url).await?;
                self.queue = Some(queue.clone());
                queue
            }
        };
        let notify_tx = self.notify_tx.take().ok_or(TransportError::NotConnected)?;
        let shutdown_rx = self.shutdown_tx.subscribe();
        self.task = Some(tokio::spawn(delivery_loop(
            queue,
            notify_tx,
            self.poll_interval,
            shutdown_rx,
        )));
        Ok(())
    }

    async fn close(&mut self) -> TransportResult<()> {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| TransportError::Task(format!("join error: {e}")))?;
        }
        self.queue = None;
        Ok(())
    }

    fn notify_channel(&mut self) -> TransportResult<mpsc::Receiver<NotificationMsg>> {
        self.notify_rx.take().ok_or(TransportError::AlreadySubscribed)
    }
}

async fn open_queue(url: &str) -> TransportResult<SqliteQueue> {
    let url = url.to_string();
    tokio::task::spawn_blocking(move || SqliteQueue::open(url))
        .await
        .map_err(|e| TransportError::Task(format!("join error: {e}")))?
}

async fn delivery_loop(
    queue: SqliteQueue,
    notify_tx: mpsc::Sender<NotificationMsg>,
    poll_interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let mut idle = true;
        match queue.peek(NOTIFICATION_QUEUE).await {
            Ok(Some(queued)) => {
                match serde_json::from_slice::<NotificationMsg>(&queued.payload) {
                    Ok(msg) => {
                        let event_id = msg.id;
                        tokio::select! {
                            sent = notify_tx.send(msg) => {
                                if sent.is_err() {
                                    debug!("notify channel closed, stopping delivery");
                                    break;
                                }
                            }
                            _ = shutdown_rx.changed() => break,
                        }
                        debug!(event_id, seq = queued.seq, "notification delivered");
                    }
                    Err(err) => {
                        warn!(seq = queued.seq, error = %err, "dropping undecodable message");
                    }
                }
                match queue.ack(queued.seq).await {
                    Ok(()) => idle = false,
                    Err(err) => error!(seq = queued.seq, error = %err, "queue ack failed"),
                }
            }
            Ok(None) => {}
            Err(err) => error!(error = %err, "queue poll failed"),
        }

        if !idle {
            continue;
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = shutdown_rx.changed() => break,
        }
    }
}
