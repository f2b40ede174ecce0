use chrono::{DateTime, Utc};

/// A domain-agnostic event.
///
/// Events are immutable facts: once emitted they are never edited.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "group.member_added").
    fn event_type(&self) -> &'static str;

    /// When the event occurred.
    fn occurred_at(&self) -> DateTime<Utc>;
}
