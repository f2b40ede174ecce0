//! Identity store model (users, roles, user settings, profile projection).
//!
//! Pure domain logic: no IO, no HTTP, no storage. Uniqueness of usernames and
//! email addresses is enforced by the store's indexes, not here.

pub mod profile;
pub mod projection;
pub mod user;

pub use profile::{ProfilePatch, UserSettingsPatch};
pub use projection::{GroupActivity, PrivateProfile, ProfileView, PublicProfile, project_profile};
pub use user::{RegisterUser, RegistrationKind, User, UserSettings, normalize_email};
