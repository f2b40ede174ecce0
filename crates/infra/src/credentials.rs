//! JWT-backed [`CredentialService`].

use std::sync::Arc;

use chrono::Utc;

use kidsbook_auth::{
    BlacklistError, CredentialError, CredentialService, Hs256Jwt, Identity, JwtValidator, Role, Session,
    TokenBlacklist, TokenValidationError,
};
use kidsbook_core::UserId;

use crate::Store;

/// Resolves bearer tokens into sessions.
///
/// The role and active flag come from the user row, not from the token, so a
/// deactivated user is locked out even while their token is still valid.
pub struct JwtCredentialService {
    jwt: Hs256Jwt,
    blacklist: Arc<dyn TokenBlacklist>,
    store: Arc<Store>,
}

impl JwtCredentialService {
    pub fn new(jwt: Hs256Jwt, blacklist: Arc<dyn TokenBlacklist>, store: Arc<Store>) -> Self {
        Self { jwt, blacklist, store }
    }

    pub fn issue(&self, user_id: UserId, role: Role) -> Result<String, TokenValidationError> {
        self.jwt.issue(user_id, role, Utc::now())
    }

    /// Blacklist `token` until it expires. A token that no longer validates
    /// is unusable already and is not listed.
    pub fn revoke(&self, token: &str) -> Result<(), BlacklistError> {
        let now = Utc::now();
        match self.jwt.validate(token, now) {
            Ok(claims) => self.blacklist.revoke(token, claims.expires_at, now),
            Err(_) => Ok(()),
        }
    }
}

impl CredentialService for JwtCredentialService {
    fn resolve(&self, bearer: &str) -> Result<Session, CredentialError> {
        let token = bearer.trim();
        if token.is_empty() {
            return Err(CredentialError::Missing);
        }

        let claims = self.jwt.validate(token, Utc::now())?;
        let user = self
            .store
            .read(|t| t.user(claims.sub).map(|u| (u.id, u.role, u.is_active)).ok())
            .ok()
            .flatten()
            .ok_or(CredentialError::UnknownUser)?;

        let (user_id, role, active) = user;
        let mut session = Session::new(Identity::new(user_id, role), token);
        session.active = active;
        session.blacklisted = self.blacklist.is_revoked(token);
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kidsbook_auth::InMemoryTokenBlacklist;
    use kidsbook_identity::User;

    use crate::ServiceError;

    fn setup() -> (JwtCredentialService, User) {
        let store = Arc::new(Store::in_memory());
        let alice = User::teacher("alice", "alice@school.org", Utc::now()).unwrap();
        store
            .transaction(|t| -> Result<(), ServiceError> {
                t.insert_user(alice.clone()).map_err(ServiceError::from)
            })
            .unwrap();
        let service = JwtCredentialService::new(
            Hs256Jwt::new("test-secret", chrono::Duration::minutes(5)),
            Arc::new(InMemoryTokenBlacklist::new()),
            store,
        );
        (service, alice)
    }

    #[test]
    fn issued_tokens_resolve_to_the_user_row() {
        let (service, alice) = setup();
        let token = service.issue(alice.id, alice.role).unwrap();
        let session = service.resolve(&token).unwrap();
        assert_eq!(session.identity, Identity::new(alice.id, Role::Teacher));
        assert!(session.is_usable());
    }

    #[test]
    fn revoked_tokens_resolve_to_blacklisted_sessions() {
        let (service, alice) = setup();
        let token = service.issue(alice.id, alice.role).unwrap();
        service.revoke(&token).unwrap();
        let session = service.resolve(&token).unwrap();
        assert!(session.blacklisted);
        assert!(!session.is_usable());
    }

    #[test]
    fn revoking_garbage_is_a_no_op() {
        let (service, _) = setup();
        assert!(service.revoke("not-a-jwt").is_ok());
    }

    #[test]
    fn revocation_surfaces_blacklist_failures() {
        struct BrokenBlacklist;
        impl TokenBlacklist for BrokenBlacklist {
            fn revoke(
                &self,
                _token: &str,
                _expires_at: chrono::DateTime<Utc>,
                _now: chrono::DateTime<Utc>,
            ) -> Result<(), BlacklistError> {
                Err(BlacklistError::Unavailable)
            }
            fn is_revoked(&self, _token: &str) -> bool {
                true
            }
        }

        let (healthy, alice) = setup();
        let service = JwtCredentialService::new(
            Hs256Jwt::new("test-secret", chrono::Duration::minutes(5)),
            Arc::new(BrokenBlacklist),
            healthy.store.clone(),
        );
        let token = service.issue(alice.id, alice.role).unwrap();
        assert_eq!(service.revoke(&token), Err(BlacklistError::Unavailable));
    }

    #[test]
    fn unknown_users_and_garbage_are_rejected() {
        let (service, _) = setup();
        let token = service.issue(UserId::new(), Role::Student).unwrap();
        assert_eq!(service.resolve(&token).unwrap_err(), CredentialError::UnknownUser);
        assert!(matches!(service.resolve("not-a-jwt"), Err(CredentialError::Token(_))));
        assert_eq!(service.resolve("  ").unwrap_err(), CredentialError::Missing);
    }
}
