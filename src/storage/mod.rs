//! Event storage abstraction with in-memory and SQLite backends.

pub mod memory;
pub mod sqlite;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    event::Event,
    types::{EventId, UserId},
};

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("event not found: {0}")]
    EventNotFound(EventId),
    #[error("date range is busy")]
    DateBusy,
    #[error("storage is not connected")]
    NotConnected,
    #[error("timestamp out of storable range: {0}")]
    TimestampOutOfRange(DateTime<Utc>),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("storage task failed: {0}")]
    Task(String),
    #[error("storage connect timed out")]
    ConnectTimeout,
    #[error("write abandoned by caller before commit")]
    Abandoned,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Contract shared by every event store backend.
///
/// Implementations must be safe to call concurrently from request handlers
/// and background loops.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn connect(&self) -> StorageResult<()>;
    async fn close(&self) -> StorageResult<()>;

    /// Stores `event` under a freshly assigned id, ignoring `event.id` and
    /// `event.notified`, and returns the new id.
    async fn insert_event(&self, event: Event) -> StorageResult<EventId>;
    /// Replaces the event with `event.id`. The stored `notified` flag is kept.
    async fn update_event(&self, event: Event) -> StorageResult<()>;
    /// Removes the event. Unknown ids are not an error.
    async fn delete_event(&self, id: EventId) -> StorageResult<()>;
    async fn lookup_event(&self, id: EventId) -> StorageResult<Event>;
    async fn list_events(&self, user_id: UserId) -> StorageResult<Vec<Event>>;
    /// Events of `user_id` whose interval intersects `[begin, end]`.
    async fn list_events_range(
        &self,
        user_id: UserId,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<Event>>;
    /// Fails with [`StorageError::DateBusy`] when any event of `user_id` other
    /// than `exclude_id` overlaps `[on_time, off_time]`.
    async fn is_busy_date_time_range(
        &self,
        exclude_id: EventId,
        user_id: UserId,
        on_time: DateTime<Utc>,
        off_time: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Unnotified events with `notify_time <= cutoff`.
    async fn list_events_due_for_notice(&self, cutoff: DateTime<Utc>) -> StorageResult<Vec<Event>>;
    /// Deletes events with `off_time < cutoff` and returns how many went away.
    async fn delete_events_older_than(&self, cutoff: DateTime<Utc>) -> StorageResult<u64>;

    async fn mark_notified(&self, id: EventId) -> StorageResult<()>;
}

/// Backend selector as written in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageKind {
    #[default]
    InMemory,
    Sqlite,
}

/// Builds the configured backend. The returned store still needs
/// [`Storage::connect`].
pub fn new_storage(kind: StorageKind, dsn: &str) -> Arc<dyn Storage> {
    match kind {
        StorageKind::InMemory => Arc::new(MemoryStorage::new()),
        StorageKind::Sqlite => Arc::new(SqliteStorage::new(dsn)),
    }
}

/// Builds the configured backend and connects it within `deadline`.
pub async fn connect_storage(
    kind: StorageKind,
    dsn: &str,
    deadline: Duration,
) -> StorageResult<Arc<dyn Storage>> {
    let storage = new_storage(kind, dsn);
    tokio::time::timeout(deadline, storage.connect())
        .await
        .map_err(|_| StorageError::ConnectTimeout)??;
    Ok(storage)
}

/// Orders listing results by start time, then id.
pub(crate) fn sort_events(events: &mut [Event]) {
    events.sort_by(|a, b| a.on_time.cmp(&b.on_time).then(a.id.cmp(&b.id)));
}
