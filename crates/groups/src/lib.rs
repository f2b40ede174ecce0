//! Group store model (groups, memberships, settings toggles).
//!
//! This crate contains the business rules for classroom groups, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod group;
pub mod membership;
pub mod settings;

pub use group::{CreateGroup, Group, GroupDetailPatch};
pub use membership::{MemberCandidate, Membership, plan_add, plan_remove};
pub use settings::{Feature, GroupSettings, SettingField, SettingsPatch};
