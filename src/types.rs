//! Shared primitive IDs and calendar-wide constants.

use std::time::Duration;

/// Store-assigned event identifier. Zero means "unassigned".
pub type EventId = u64;
/// Owner identifier. Zero is never a valid owner.
pub type UserId = u64;

/// Longest accepted event title, in characters.
pub const MAX_TITLE_LEN: usize = 150;

/// Deadline applied to every store call made by the calendar service.
pub const STORE_CALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Queue name notifications are published to and consumed from.
pub const NOTIFICATION_QUEUE: &str = "notification";

/// Upper bound for opening a store at process start.
pub const STORE_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest the HTTP server waits for in-flight requests after a shutdown signal.
pub const HTTP_DRAIN_TIMEOUT: Duration = Duration::from_secs(3);
