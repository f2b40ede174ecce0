//! Revoked bearer tokens.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlacklistError {
    #[error("token blacklist unavailable")]
    Unavailable,
}

/// Store of revoked tokens. Logout adds; session resolution checks.
///
/// A token only needs to stay listed until it expires, after which claim
/// validation rejects it anyway.
pub trait TokenBlacklist: Send + Sync {
    fn revoke(&self, token: &str, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), BlacklistError>;

    fn is_revoked(&self, token: &str) -> bool;
}

#[derive(Debug, Default)]
pub struct InMemoryTokenBlacklist {
    tokens: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryTokenBlacklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tokens currently listed.
    pub fn len(&self) -> usize {
        self.tokens.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TokenBlacklist for InMemoryTokenBlacklist {
    /// Lists `token` and drops every entry that has expired by `now`.
    fn revoke(&self, token: &str, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), BlacklistError> {
        let mut guard = self.tokens.write().map_err(|_| BlacklistError::Unavailable)?;
        guard.retain(|_, exp| *exp > now);
        if expires_at > now {
            guard.insert(token.to_string(), expires_at);
        }
        Ok(())
    }

    fn is_revoked(&self, token: &str) -> bool {
        // A poisoned lock fails closed.
        self.tokens.read().map(|g| g.contains_key(token)).unwrap_or(true)
    }
}
