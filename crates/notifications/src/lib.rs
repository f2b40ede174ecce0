//! Notification fan-out: immutable notification records, per-user unseen
//! counters, and best-effort push delivery after commit.

pub mod notification;
pub mod push;

pub use notification::{Notification, NotificationDraft, UnseenCount};
pub use push::{EventBusPushSink, NoopPushSink, PushError, PushSink, deliver_after_commit};
