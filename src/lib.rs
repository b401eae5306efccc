//! Multi-user event calendar with conflict checks and scheduled reminders.
//!
//! Three processes share this library: the calendar service behind an HTTP
//! API, the scheduler that publishes due notifications and purges stale
//! events, and the sender that consumes notifications and marks events as
//! notified.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use calendar::{calendar::CalendarService, event::EventDraft, storage::MemoryStorage};
//! use chrono::{TimeZone, Utc};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let svc = CalendarService::new(Arc::new(MemoryStorage::new()));
//! let on = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
//! let id = svc
//!     .insert_event(&EventDraft {
//!         user_id: 7,
//!         title: "standup".to_string(),
//!         on_time: Some(on),
//!         off_time: Some(on + chrono::TimeDelta::minutes(15)),
//!         ..EventDraft::default()
//!     })
//!     .await
//!     .expect("insert");
//! assert_eq!(id, 1);
//! # }
//! ```

/// Validation rules, period arithmetic and the calendar service.
pub mod calendar;
/// TOML configuration of the binaries.
pub mod config;
/// Event records and notification messages.
pub mod event;
/// HTTP router over the calendar service.
pub mod http;
/// Subscriber setup for `tracing`.
pub mod logging;
/// Scheduler and sender loops plus shutdown signalling.
pub mod runtime;
/// Event store trait and backends.
pub mod storage;
/// Notification producers and consumers.
pub mod transport;
/// Shared id aliases and constants.
pub mod types;
