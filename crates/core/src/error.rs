//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// uniqueness, disallowed transitions, disabled features). Identity and
/// permission failures live in `kidsbook-auth`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed or missing input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A unique key already exists (duplicate member, group name, like pair...).
    #[error("{0}")]
    Conflict(String),

    /// The operation is semantically disallowed (e.g. removing a group creator).
    #[error("{0}")]
    InvalidOperation(String),

    /// A referenced row does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A group-level feature toggle is switched off.
    #[error("{0}")]
    FeatureDisabled(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    /// `what` names the missing entity ("group", "post", ...).
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn feature_disabled(msg: impl Into<String>) -> Self {
        Self::FeatureDisabled(msg.into())
    }
}
