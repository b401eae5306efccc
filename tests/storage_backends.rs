use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use tempfile::TempDir;

use calendar::{
    event::Event,
    storage::{MemoryStorage, SqliteStorage, Storage, StorageError, StorageKind, new_storage},
};

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap()
}

fn event(user_id: u64, start_min: i64, len_min: i64) -> Event {
    let on_time = base() + TimeDelta::minutes(start_min);
    Event {
        id: 0,
        user_id,
        title: format!("meeting {start_min}"),
        description: "room 4".to_string(),
        on_time,
        off_time: on_time + TimeDelta::minutes(len_min),
        notify_time: None,
        notified: false,
    }
}

async fn backends(tmp: &TempDir) -> Vec<(&'static str, Arc<dyn Storage>)> {
    let memory: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let path = tmp.path().join("events.db");
    let sqlite: Arc<dyn Storage> = Arc::new(SqliteStorage::new(path.to_string_lossy()));
    for store in [&memory, &sqlite] {
        store.connect().await.expect("connect");
    }
    vec![("memory", memory), ("sqlite", sqlite)]
}

#[tokio::test]
async fn insert_assigns_fresh_ids_and_clears_notified() {
    let tmp = TempDir::new().expect("tmp");
    for (name, store) in backends(&tmp).await {
        let mut ev = event(1, 0, 30);
        ev.id = 99;
        ev.notified = true;
        let id1 = store.insert_event(ev).await.expect("insert1");
        let id2 = store.insert_event(event(1, 60, 30)).await.expect("insert2");
        assert_eq!((id1, id2), (1, 2), "{name}");

        let got = store.lookup_event(id1).await.expect("lookup");
        assert_eq!(got.id, id1, "{name}");
        assert!(!got.notified, "{name}");
        assert_eq!(got.on_time, base(), "{name}");
        assert_eq!(got.description, "room 4", "{name}");
    }
}

#[tokio::test]
async fn update_replaces_fields_but_keeps_notified() {
    let tmp = TempDir::new().expect("tmp");
    for (name, store) in backends(&tmp).await {
        let id = store.insert_event(event(1, 0, 30)).await.expect("insert");
        store.mark_notified(id).await.expect("mark");

        let mut changed = event(2, 120, 15);
        changed.id = id;
        changed.title = "moved".to_string();
        store.update_event(changed).await.expect("update");

        let got = store.lookup_event(id).await.expect("lookup");
        assert_eq!(got.title, "moved", "{name}");
        assert_eq!(got.user_id, 2, "{name}");
        assert!(got.notified, "{name}");
        assert!(store.list_events(1).await.expect("list").is_empty(), "{name}");
        assert_eq!(store.list_events(2).await.expect("list").len(), 1, "{name}");

        let mut ghost = event(1, 0, 30);
        ghost.id = 777;
        let err = store.update_event(ghost).await.unwrap_err();
        assert!(matches!(err, StorageError::EventNotFound(777)), "{name}: {err}");
    }
}

#[tokio::test]
async fn delete_is_idempotent() {
    let tmp = TempDir::new().expect("tmp");
    for (name, store) in backends(&tmp).await {
        let id = store.insert_event(event(1, 0, 30)).await.expect("insert");
        store.delete_event(id).await.expect("delete");
        store.delete_event(id).await.expect("delete again");
        store.delete_event(12345).await.expect("delete unknown");
        let err = store.lookup_event(id).await.unwrap_err();
        assert!(matches!(err, StorageError::EventNotFound(_)), "{name}: {err}");
    }
}

#[tokio::test]
async fn busy_check_respects_user_and_excluded_id() {
    let tmp = TempDir::new().expect("tmp");
    for (name, store) in backends(&tmp).await {
        let id = store.insert_event(event(1, 60, 60)).await.expect("insert");
        let on = base() + TimeDelta::minutes(90);
        let off = on + TimeDelta::minutes(60);

        let err = store.is_busy_date_time_range(0, 1, on, off).await.unwrap_err();
        assert!(matches!(err, StorageError::DateBusy), "{name}: {err}");

        store
            .is_busy_date_time_range(id, 1, on, off)
            .await
            .unwrap_or_else(|e| panic!("{name}: own event must not block: {e}"));
        store
            .is_busy_date_time_range(0, 2, on, off)
            .await
            .unwrap_or_else(|e| panic!("{name}: other user must not block: {e}"));

        // Entirely before and entirely after.
        let early = base();
        store
            .is_busy_date_time_range(0, 1, early, early + TimeDelta::minutes(59))
            .await
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        let late = base() + TimeDelta::minutes(121);
        store
            .is_busy_date_time_range(0, 1, late, late + TimeDelta::minutes(30))
            .await
            .unwrap_or_else(|e| panic!("{name}: {e}"));

        // Enclosing range.
        let err = store
            .is_busy_date_time_range(0, 1, base(), base() + TimeDelta::hours(5))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DateBusy), "{name}");
    }
}

#[tokio::test]
async fn range_listing_is_inclusive_and_ordered() {
    let tmp = TempDir::new().expect("tmp");
    for (name, store) in backends(&tmp).await {
        let late = store.insert_event(event(1, 300, 30)).await.expect("late");
        let early = store.insert_event(event(1, 0, 30)).await.expect("early");
        let _other_user = store.insert_event(event(2, 0, 30)).await.expect("other");
        let _outside = store.insert_event(event(1, 1000, 30)).await.expect("outside");

        // `end` touches the start of `late`, `begin` touches the end of `early`.
        let begin = base() + TimeDelta::minutes(30);
        let end = base() + TimeDelta::minutes(300);
        let ids: Vec<u64> = store
            .list_events_range(1, begin, end)
            .await
            .expect("range")
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![early, late], "{name}");

        let all: Vec<u64> = store
            .list_events(1)
            .await
            .expect("list")
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(all.len(), 3, "{name}");
        assert_eq!(all[0], early, "{name}");
    }
}

#[tokio::test]
async fn due_notices_and_purge() {
    let tmp = TempDir::new().expect("tmp");
    for (name, store) in backends(&tmp).await {
        let mut due = event(1, 0, 60);
        due.notify_time = Some(due.on_time);
        let due_id = store.insert_event(due).await.expect("due");

        let mut later = event(1, 600, 60);
        later.notify_time = Some(later.on_time);
        let later_id = store.insert_event(later).await.expect("later");

        let _silent = store.insert_event(event(1, 100, 60)).await.expect("silent");

        let cutoff = base() + TimeDelta::minutes(5);
        let found: Vec<u64> = store
            .list_events_due_for_notice(cutoff)
            .await
            .expect("due")
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(found, vec![due_id], "{name}");

        store.mark_notified(due_id).await.expect("mark");
        assert!(
            store.list_events_due_for_notice(cutoff).await.expect("due").is_empty(),
            "{name}"
        );
        let err = store.mark_notified(4242).await.unwrap_err();
        assert!(matches!(err, StorageError::EventNotFound(4242)), "{name}");

        // Purges only events that ended strictly before the cutoff.
        let removed = store
            .delete_events_older_than(base() + TimeDelta::minutes(180))
            .await
            .expect("purge");
        assert_eq!(removed, 2, "{name}");
        let left: Vec<u64> = store
            .list_events(1)
            .await
            .expect("list")
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(left, vec![later_id], "{name}");
    }
}

#[tokio::test]
async fn sqlite_survives_reopen_and_keeps_nanoseconds() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("reopen.db");
    let dsn = path.to_string_lossy().to_string();

    let mut ev = event(5, 0, 30);
    ev.on_time += TimeDelta::nanoseconds(123_456_789);
    ev.notify_time = Some(ev.on_time);

    let store = SqliteStorage::new(dsn.clone());
    store.connect().await.expect("connect");
    let id = store.insert_event(ev.clone()).await.expect("insert");
    store.close().await.expect("close");

    let reopened = new_storage(StorageKind::Sqlite, &dsn);
    reopened.connect().await.expect("reconnect");
    let got = reopened.lookup_event(id).await.expect("lookup");
    assert_eq!(got.on_time, ev.on_time);
    assert_eq!(got.notify_time, ev.notify_time);
    assert_eq!(got.title, ev.title);
}

#[tokio::test]
async fn sqlite_requires_connect() {
    let store = SqliteStorage::new(":memory:");
    let err = store.lookup_event(1).await.unwrap_err();
    assert!(matches!(err, StorageError::NotConnected), "{err}");

    store.connect().await.expect("connect");
    store.close().await.expect("close");
    store.close().await.expect("close twice");
    let err = store.list_events(1).await.unwrap_err();
    assert!(matches!(err, StorageError::NotConnected), "{err}");
}
