use thiserror::Error;

use crate::{Session, TokenValidationError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("missing bearer token")]
    Missing,

    #[error(transparent)]
    Token(#[from] TokenValidationError),

    #[error("unknown user")]
    UnknownUser,
}

/// Boundary collaborator: bearer material → session.
///
/// A resolved session may still be inactive or blacklisted; rejecting those is
/// the engine's Authenticated stage, not the resolver's.
pub trait CredentialService: Send + Sync {
    fn resolve(&self, bearer: &str) -> Result<Session, CredentialError>;
}
