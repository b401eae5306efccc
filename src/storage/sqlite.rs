//! SQLite-backed event store.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, Row, Transaction, params};
use tokio::sync::{Mutex, oneshot};
use tracing::debug;

use crate::{
    event::Event,
    types::{EventId, UserId},
};

use super::{Storage, StorageError, StorageResult};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite implementation of [`Storage`].
///
/// The connection is opened by [`Storage::connect`]; every statement runs on
/// the blocking pool so the async callers never block a runtime worker.
pub struct SqliteStorage {
    dsn: String,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteStorage {
    /// `dsn` is a database path, or `:memory:` for a private in-memory database.
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            conn: Arc::new(Mutex::new(None)),
        }
    }

    fn open_connection(dsn: &str) -> StorageResult<Connection> {
        let conn = if dsn == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(dsn)?
        };
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(conn)
    }

    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.blocking_lock();
            let conn = guard.as_mut().ok_or(StorageError::NotConnected)?;
            f(conn)
        })
        .await
        .map_err(|e| StorageError::Task(format!("join error: {e}")))?
    }

    /// Runs `f` in a transaction that commits only while the caller is still
    /// awaiting it. A caller that gave up (a timed-out request) gets the
    /// transaction rolled back instead of a late, unreported commit.
    async fn with_tx<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Transaction<'_>) -> StorageResult<T> + Send + 'static,
    {
        let (alive, waiting) = oneshot::channel::<()>();
        let result = self
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                let out = f(&tx)?;
                if alive.is_closed() {
                    debug!("caller gone, rolling back");
                    return Err(StorageError::Abandoned);
                }
                tx.commit()?;
                Ok(out)
            })
            .await;
        drop(waiting);
        result
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn connect(&self) -> StorageResult<()> {
        let dsn = self.dsn.clone();
        let conn = tokio::task::spawn_blocking(move || Self::open_connection(&dsn))
            .await
            .map_err(|e| StorageError::Task(format!("join error: {e}")))??;
        *self.conn.lock().await = Some(conn);
        debug!(dsn = %self.dsn, "sqlite storage connected");
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        let Some(conn) = self.conn.lock().await.take() else {
            return Ok(());
        };
        conn.close().map_err(|(_, err)| StorageError::Sqlite(err))?;
        debug!(dsn = %self.dsn, "sqlite storage closed");
        Ok(())
    }

    async fn insert_event(&self, event: Event) -> StorageResult<EventId> {
        let on = to_nanos(event.on_time)?;
        let off = to_nanos(event.off_time)?;
        let notify = event.notify_time.map(to_nanos).transpose()?;
        self.with_tx(move |tx| {
            tx.execute(
                "INSERT INTO events(userid, title, description, ontime, offtime, notifytime, notified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
                params![event.user_id as i64, event.title, event.description, on, off, notify],
            )?;
            Ok(tx.last_insert_rowid() as EventId)
        })
        .await
    }

    async fn update_event(&self, event: Event) -> StorageResult<()> {
        let on = to_nanos(event.on_time)?;
        let off = to_nanos(event.off_time)?;
        let notify = event.notify_time.map(to_nanos).transpose()?;
        self.with_tx(move |tx| {
            let changed = tx.execute(
                "UPDATE events
                 SET userid = ?2, title = ?3, description = ?4, ontime = ?5, offtime = ?6, notifytime = ?7
                 WHERE id = ?1",
                params![
                    event.id as i64,
                    event.user_id as i64,
                    event.title,
                    event.description,
                    on,
                    off,
                    notify
                ],
            )?;
            if changed == 0 {
                return Err(StorageError::EventNotFound(event.id));
            }
            Ok(())
        })
        .await
    }

    async fn delete_event(&self, id: EventId) -> StorageResult<()> {
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM events WHERE id = ?1", params![id as i64])?;
            Ok(())
        })
        .await
    }

    async fn lookup_event(&self, id: EventId) -> StorageResult<Event> {
        self.with_conn(move |conn| {
            let mut found = query_events(
                conn,
                "SELECT id, userid, title, description, ontime, offtime, notifytime, notified
                 FROM events WHERE id = ?1",
                params![id as i64],
            )?;
            found.pop().ok_or(StorageError::EventNotFound(id))
        })
        .await
    }

    async fn list_events(&self, user_id: UserId) -> StorageResult<Vec<Event>> {
        self.with_conn(move |conn| {
            query_events(
                conn,
                "SELECT id, userid, title, description, ontime, offtime, notifytime, notified
                 FROM events WHERE userid = ?1
                 ORDER BY ontime ASC, id ASC",
                params![user_id as i64],
            )
        })
        .await
    }

    async fn list_events_range(
        &self,
        user_id: UserId,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<Event>> {
        let begin = clamp_nanos(begin);
        let end = clamp_nanos(end);
        self.with_conn(move |conn| {
            query_events(
                conn,
                "SELECT id, userid, title, description, ontime, offtime, notifytime, notified
                 FROM events
                 WHERE userid = ?1 AND ontime <= ?3 AND offtime >= ?2
                 ORDER BY ontime ASC, id ASC",
                params![user_id as i64, begin, end],
            )
        })
        .await
    }

    async fn is_busy_date_time_range(
        &self,
        exclude_id: EventId,
        user_id: UserId,
        on_time: DateTime<Utc>,
        off_time: DateTime<Utc>,
    ) -> StorageResult<()> {
        let on = clamp_nanos(on_time);
        let off = clamp_nanos(off_time);
        self.with_conn(move |conn| {
            let busy: bool = conn.query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM events
                     WHERE id != ?1 AND userid = ?2 AND ontime <= ?4 AND offtime >= ?3
                 )",
                params![exclude_id as i64, user_id as i64, on, off],
                |row| row.get(0),
            )?;
            if busy {
                return Err(StorageError::DateBusy);
            }
            Ok(())
        })
        .await
    }

    async fn list_events_due_for_notice(&self, cutoff: DateTime<Utc>) -> StorageResult<Vec<Event>> {
        let cutoff = clamp_nanos(cutoff);
        self.with_conn(move |conn| {
            query_events(
                conn,
                "SELECT id, userid, title, description, ontime, offtime, notifytime, notified
                 FROM events
                 WHERE notified = 0 AND notifytime IS NOT NULL AND notifytime <= ?1
                 ORDER BY ontime ASC, id ASC",
                params![cutoff],
            )
        })
        .await
    }

    async fn delete_events_older_than(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        let cutoff = clamp_nanos(cutoff);
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM events WHERE offtime < ?1", params![cutoff])?;
            Ok(removed as u64)
        })
        .await
    }

    async fn mark_notified(&self, id: EventId) -> StorageResult<()> {
        self.with_tx(move |tx| {
            let changed = tx.execute(
                "UPDATE events SET notified = 1 WHERE id = ?1",
                params![id as i64],
            )?;
            if changed == 0 {
                return Err(StorageError::EventNotFound(id));
            }
            Ok(())
        })
        .await
    }
}

fn query_events<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> StorageResult<Vec<Event>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, event_from_row)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    let id: i64 = row.get(0)?;
    let user_id: i64 = row.get(1)?;
    let notify: Option<i64> = row.get(6)?;
    Ok(Event {
        id: id as EventId,
        user_id: user_id as UserId,
        title: row.get(2)?,
        description: row.get(3)?,
        on_time: from_nanos(row.get(4)?),
        off_time: from_nanos(row.get(5)?),
        notify_time: notify.map(from_nanos),
        notified: row.get(7)?,
    })
}

fn to_nanos(t: DateTime<Utc>) -> StorageResult<i64> {
    t.timestamp_nanos_opt()
        .ok_or(StorageError::TimestampOutOfRange(t))
}

/// Query bounds saturate: every stored instant lies inside the i64 range.
fn clamp_nanos(t: DateTime<Utc>) -> i64 {
    t.timestamp_nanos_opt().unwrap_or(if t < DateTime::UNIX_EPOCH {
        i64::MIN
    } else {
        i64::MAX
    })
}

fn from_nanos(nanos: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(nanos)
}
