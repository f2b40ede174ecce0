//! `kidsbook-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model and request-field coercion.

pub mod coerce;
pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CommentId, GameId, GroupId, NotificationId, PostId, SceneId, SurveyId, UserId};
