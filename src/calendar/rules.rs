//! Stateless field validation for inbound events.

use chrono::{DateTime, Utc};

use crate::{
    event::{Event, EventDraft},
    types::MAX_TITLE_LEN,
};

use super::CalendarError;

/// Validates `draft` and returns the event it describes.
///
/// `check_id` demands a non-zero id, as updates do. The first violated rule
/// wins, checked in field order. Instants must fit i64 nanoseconds since the
/// epoch so every backend can hold them.
pub fn check_basic_rules(draft: &EventDraft, check_id: bool) -> Result<Event, CalendarError> {
    if check_id && draft.id == 0 {
        return Err(CalendarError::BadId("zero"));
    }

    if draft.user_id == 0 {
        return Err(CalendarError::BadUserId("zero"));
    }

    if draft.title.chars().count() > MAX_TITLE_LEN {
        return Err(CalendarError::BadTitle("longer than 150 characters"));
    }

    let Some(on_time) = draft.on_time else {
        return Err(CalendarError::BadOnTime("empty"));
    };
    if !storable(on_time) {
        return Err(CalendarError::BadOnTime("out of range"));
    }

    let off_time = match draft.off_time {
        None => return Err(CalendarError::BadOffTime("empty")),
        Some(t) if !storable(t) => return Err(CalendarError::BadOffTime("out of range")),
        Some(t) if t < on_time => return Err(CalendarError::BadOffTime("before on_time")),
        Some(t) if t == on_time => return Err(CalendarError::BadOffTime("equal to on_time")),
        Some(t) => t,
    };

    if let Some(notify) = draft.notify_time {
        if !storable(notify) {
            return Err(CalendarError::BadNotifyTime("out of range"));
        }
        if notify > off_time {
            return Err(CalendarError::BadNotifyTime("after off_time"));
        }
        if notify < on_time {
            return Err(CalendarError::BadNotifyTime("before on_time"));
        }
    }

    Ok(Event {
        id: draft.id,
        user_id: draft.user_id,
        title: draft.title.clone(),
        description: draft.description.clone(),
        on_time,
        off_time,
        notify_time: draft.notify_time,
        notified: false,
    })
}

fn storable(t: DateTime<Utc>) -> bool {
    t.timestamp_nanos_opt().is_some()
}
