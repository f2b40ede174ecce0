//! Entity trait: identity + continuity across state changes.

use chrono::{DateTime, Utc};

/// Entity marker + minimal interface.
///
/// Every persisted row type implements this so the store can key its tables
/// by id. Ids are time-ordered, so `Ord` on the id doubles as creation order.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + Ord + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;

    /// When the row was created.
    fn created_at(&self) -> DateTime<Utc>;
}
