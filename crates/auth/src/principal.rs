use serde::{Deserialize, Serialize};

use kidsbook_core::UserId;

use crate::Role;

/// Who the caller is, as far as authorization is concerned.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }
}

/// A resolved session: identity plus the liveness facts the engine checks.
///
/// Produced by a `CredentialService`; never constructed from client input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub identity: Identity,
    /// The user account is active.
    pub active: bool,
    /// The presented token was revoked (logout).
    pub blacklisted: bool,
    /// Raw bearer token the session was resolved from (needed for logout).
    #[serde(skip)]
    pub token: String,
}

impl Session {
    pub fn new(identity: Identity, token: impl Into<String>) -> Self {
        Self {
            identity,
            active: true,
            blacklisted: false,
            token: token.into(),
        }
    }

    /// Authenticated = present, active and not blacklisted.
    pub fn is_usable(&self) -> bool {
        self.active && !self.blacklisted
    }
}
