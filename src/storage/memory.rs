//! In-process event store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::{
    event::Event,
    types::{EventId, UserId},
};

use super::{Storage, StorageError, StorageResult, sort_events};

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<EventId, Event>,
    by_user: HashMap<UserId, Vec<EventId>>,
    next_event_id: EventId,
}

/// Map-backed store guarded by a single reader/writer lock.
///
/// The id counter lives under the same lock as the records, so ids are unique
/// per instance and never reused.
#[derive(Debug)]
pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_event_id: 1,
                ..Inner::default()
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Inner {
    fn take_next_event_id(&mut self) -> EventId {
        let id = self.next_event_id;
        self.next_event_id += 1;
        id
    }

    fn user_events(&self, user_id: UserId) -> impl Iterator<Item = &Event> {
        self.by_user
            .get(&user_id)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.records.get(id))
    }

    fn remove(&mut self, id: EventId) -> Option<Event> {
        let rec = self.records.remove(&id)?;
        if let Some(ids) = self.by_user.get_mut(&rec.user_id) {
            remove_from_vec_index(ids, id);
            if ids.is_empty() {
                self.by_user.remove(&rec.user_id);
            }
        }
        Some(rec)
    }
}

fn remove_from_vec_index(v: &mut Vec<EventId>, id: EventId) {
    if let Some(pos) = v.iter().position(|x| *x == id) {
        v.swap_remove(pos);
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn connect(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn insert_event(&self, mut event: Event) -> StorageResult<EventId> {
        let mut inner = self.inner.write();
        let id = inner.take_next_event_id();
        event.id = id;
        event.notified = false;
        inner.by_user.entry(event.user_id).or_default().push(id);
        inner.records.insert(id, event);
        Ok(id)
    }

    async fn update_event(&self, mut event: Event) -> StorageResult<()> {
        let mut inner = self.inner.write();
        let old = inner
            .records
            .get(&event.id)
            .ok_or(StorageError::EventNotFound(event.id))?;
        let old_user = old.user_id;
        event.notified = old.notified;

        if old_user != event.user_id {
            if let Some(ids) = inner.by_user.get_mut(&old_user) {
                remove_from_vec_index(ids, event.id);
                if ids.is_empty() {
                    inner.by_user.remove(&old_user);
                }
            }
            inner.by_user.entry(event.user_id).or_default().push(event.id);
        }

        inner.records.insert(event.id, event);
        Ok(())
    }

    async fn delete_event(&self, id: EventId) -> StorageResult<()> {
        self.inner.write().remove(id);
        Ok(())
    }

    async fn lookup_event(&self, id: EventId) -> StorageResult<Event> {
        self.inner
            .read()
            .records
            .get(&id)
            .cloned()
            .ok_or(StorageError::EventNotFound(id))
    }

    async fn list_events(&self, user_id: UserId) -> StorageResult<Vec<Event>> {
        let mut out: Vec<Event> = self.inner.read().user_events(user_id).cloned().collect();
        sort_events(&mut out);
        Ok(out)
    }

    async fn list_events_range(
        &self,
        user_id: UserId,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<Event>> {
        let mut out: Vec<Event> = self
            .inner
            .read()
            .user_events(user_id)
            .filter(|e| e.overlaps(begin, end))
            .cloned()
            .collect();
        sort_events(&mut out);
        Ok(out)
    }

    async fn is_busy_date_time_range(
        &self,
        exclude_id: EventId,
        user_id: UserId,
        on_time: DateTime<Utc>,
        off_time: DateTime<Utc>,
    ) -> StorageResult<()> {
        let inner = self.inner.read();
        let busy = inner
            .user_events(user_id)
            .any(|e| e.id != exclude_id && e.overlaps(on_time, off_time));
        if busy {
            return Err(StorageError::DateBusy);
        }
        Ok(())
    }

    async fn list_events_due_for_notice(&self, cutoff: DateTime<Utc>) -> StorageResult<Vec<Event>> {
        let mut out: Vec<Event> = self
            .inner
            .read()
            .records
            .values()
            .filter(|e| e.is_due_for_notice(cutoff))
            .cloned()
            .collect();
        sort_events(&mut out);
        Ok(out)
    }

    async fn delete_events_older_than(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        let mut inner = self.inner.write();
        let stale: Vec<EventId> = inner
            .records
            .values()
            .filter(|e| e.off_time < cutoff)
            .map(|e| e.id)
            .collect();
        for id in &stale {
            inner.remove(*id);
        }
        Ok(stale.len() as u64)
    }

    async fn mark_notified(&self, id: EventId) -> StorageResult<()> {
        let mut inner = self.inner.write();
        let rec = inner
            .records
            .get_mut(&id)
            .ok_or(StorageError::EventNotFound(id))?;
        rec.notified = true;
        Ok(())
    }
}
