//! Calendar event record, caller-facing draft, and notification payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EventId, UserId};

/// Fully validated, stored calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Store-assigned identifier, zero before insert.
    pub id: EventId,
    /// Owner of the event.
    pub user_id: UserId,
    /// Short title, at most [`crate::types::MAX_TITLE_LEN`] characters.
    pub title: String,
    /// Free text.
    pub description: String,
    /// Start instant.
    pub on_time: DateTime<Utc>,
    /// End instant, strictly after `on_time`.
    pub off_time: DateTime<Utc>,
    /// Instant at or after which a notification is due.
    pub notify_time: Option<DateTime<Utc>>,
    /// Set once the sender has acknowledged delivery.
    pub notified: bool,
}

impl Event {
    /// Returns true when `[on_time, off_time]` intersects `[begin, end]`,
    /// touching endpoints included.
    pub fn overlaps(&self, begin: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.on_time <= end && begin <= self.off_time
    }

    /// Returns true when a notification is due at `cutoff` and has not been sent.
    pub fn is_due_for_notice(&self, cutoff: DateTime<Utc>) -> bool {
        !self.notified && self.notify_time.is_some_and(|t| t <= cutoff)
    }
}

/// Insert/update payload as supplied by callers.
///
/// Instants are optional here so that missing values surface as typed
/// validation errors instead of decode failures; see
/// [`crate::calendar::rules::check_basic_rules`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventDraft {
    /// Event id, required on update only.
    pub id: EventId,
    /// Owner of the event.
    pub user_id: UserId,
    /// Short title.
    pub title: String,
    /// Free text.
    pub description: String,
    /// Start instant.
    pub on_time: Option<DateTime<Utc>>,
    /// End instant.
    pub off_time: Option<DateTime<Utc>>,
    /// Optional notification instant.
    pub notify_time: Option<DateTime<Utc>>,
}

impl From<Event> for EventDraft {
    fn from(event: Event) -> Self {
        Self {
            id: event.id,
            user_id: event.user_id,
            title: event.title,
            description: event.description,
            on_time: Some(event.on_time),
            off_time: Some(event.off_time),
            notify_time: event.notify_time,
        }
    }
}

/// Queue payload derived from an [`Event`] at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMsg {
    /// Originating event id.
    pub id: EventId,
    /// Event title.
    pub title: String,
    /// Event start instant.
    pub date: DateTime<Utc>,
    /// Event owner.
    pub user_id: UserId,
}

impl From<&Event> for NotificationMsg {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id,
            title: event.title.clone(),
            date: event.on_time,
            user_id: event.user_id,
        }
    }
}
