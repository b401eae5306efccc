//! Calendar service: business rules and conflict checks in front of a store.

pub mod period;
pub mod rules;

use std::{future::Future, sync::Arc};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    event::{Event, EventDraft},
    storage::{Storage, StorageError},
    types::{EventId, STORE_CALL_TIMEOUT, UserId},
};

pub use rules::check_basic_rules;

const OUT_OF_RANGE: CalendarError = CalendarError::BadDate("period outside supported range");

#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("wrong id: {0}")]
    BadId(&'static str),
    #[error("wrong user_id: {0}")]
    BadUserId(&'static str),
    #[error("wrong title: {0}")]
    BadTitle(&'static str),
    #[error("wrong on_time: {0}")]
    BadOnTime(&'static str),
    #[error("wrong off_time: {0}")]
    BadOffTime(&'static str),
    #[error("wrong notify_time: {0}")]
    BadNotifyTime(&'static str),
    #[error("wrong date: {0}")]
    BadDate(&'static str),
    #[error("date is busy")]
    DateBusy,
    #[error("event not found: {0}")]
    EventNotFound(EventId),
    #[error("storage call timed out")]
    Timeout,
    #[error(transparent)]
    Storage(StorageError),
}

impl CalendarError {
    /// True for rejections caused by caller input rather than infrastructure.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Timeout | Self::Storage(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::BadId(_)
                | Self::BadUserId(_)
                | Self::BadTitle(_)
                | Self::BadOnTime(_)
                | Self::BadOffTime(_)
                | Self::BadNotifyTime(_)
                | Self::BadDate(_)
        )
    }
}

impl From<StorageError> for CalendarError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::DateBusy => Self::DateBusy,
            StorageError::EventNotFound(id) => Self::EventNotFound(id),
            other => Self::Storage(other),
        }
    }
}

/// Validating front end over a [`Storage`] backend.
///
/// Inserts and updates pass through one write gate, so the busy-range check
/// and the write that follows it cannot interleave with another writer in
/// this process.
///
/// Every store call is bounded by [`STORE_CALL_TIMEOUT`]. A timed-out call is
/// dropped, not cancelled: the backend must not commit a write whose caller
/// is gone (see `SqliteStorage`, which rolls such writes back).
pub struct CalendarService {
    storage: Arc<dyn Storage>,
    write_gate: Mutex<()>,
}

impl CalendarService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            write_gate: Mutex::new(()),
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub async fn insert_event(&self, draft: &EventDraft) -> Result<EventId, CalendarError> {
        let mut event = check_basic_rules(draft, false)?;
        // Ids are store-assigned; a caller-supplied one must not exempt an
        // existing event from the busy check.
        event.id = 0;

        let _gate = self.write_gate.lock().await;
        with_deadline(self.storage.is_busy_date_time_range(
            event.id,
            event.user_id,
            event.on_time,
            event.off_time,
        ))
        .await?;
        let id = with_deadline(self.storage.insert_event(event)).await?;
        debug!(event_id = id, user_id = draft.user_id, "event inserted");
        Ok(id)
    }

    pub async fn update_event(&self, draft: &EventDraft) -> Result<(), CalendarError> {
        let event = check_basic_rules(draft, true)?;

        let _gate = self.write_gate.lock().await;
        with_deadline(self.storage.is_busy_date_time_range(
            event.id,
            event.user_id,
            event.on_time,
            event.off_time,
        ))
        .await?;
        with_deadline(self.storage.update_event(event)).await?;
        debug!(event_id = draft.id, user_id = draft.user_id, "event updated");
        Ok(())
    }

    pub async fn delete_event(&self, id: EventId) -> Result<(), CalendarError> {
        with_deadline(self.storage.delete_event(id)).await
    }

    pub async fn lookup_event(&self, id: EventId) -> Result<Event, CalendarError> {
        if id == 0 {
            return Err(CalendarError::BadId("zero"));
        }
        with_deadline(self.storage.lookup_event(id)).await
    }

    pub async fn list_events(&self, user_id: UserId) -> Result<Vec<Event>, CalendarError> {
        ensure_user(user_id)?;
        with_deadline(self.storage.list_events(user_id)).await
    }

    /// Events of `user_id` intersecting the UTC calendar day of `date`.
    pub async fn list_events_day(
        &self,
        user_id: UserId,
        date: DateTime<Utc>,
    ) -> Result<Vec<Event>, CalendarError> {
        ensure_user(user_id)?;
        let (begin, end) = period::day_bounds(date.date_naive()).ok_or(OUT_OF_RANGE)?;
        self.list_range(user_id, begin, end).await
    }

    /// Events of `user_id` intersecting the Monday-to-Sunday week of `date`.
    pub async fn list_events_week(
        &self,
        user_id: UserId,
        date: DateTime<Utc>,
    ) -> Result<Vec<Event>, CalendarError> {
        ensure_user(user_id)?;
        let (begin, end) = period::week_bounds(date.date_naive()).ok_or(OUT_OF_RANGE)?;
        self.list_range(user_id, begin, end).await
    }

    /// Events of `user_id` intersecting the calendar month of `date`.
    pub async fn list_events_month(
        &self,
        user_id: UserId,
        date: DateTime<Utc>,
    ) -> Result<Vec<Event>, CalendarError> {
        ensure_user(user_id)?;
        let (begin, end) = period::month_bounds(date.date_naive()).ok_or(OUT_OF_RANGE)?;
        self.list_range(user_id, begin, end).await
    }

    pub async fn close(&self) -> Result<(), CalendarError> {
        self.storage.close().await?;
        info!("calendar storage closed");
        Ok(())
    }

    async fn list_range(
        &self,
        user_id: UserId,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>, CalendarError> {
        with_deadline(self.storage.list_events_range(user_id, begin, end)).await
    }
}

fn ensure_user(user_id: UserId) -> Result<(), CalendarError> {
    if user_id == 0 {
        return Err(CalendarError::BadUserId("zero"));
    }
    Ok(())
}

async fn with_deadline<T, F>(fut: F) -> Result<T, CalendarError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    tokio::time::timeout(STORE_CALL_TIMEOUT, fut)
        .await
        .map_err(|_| CalendarError::Timeout)?
        .map_err(CalendarError::from)
}
