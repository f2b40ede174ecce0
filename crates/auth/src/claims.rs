use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kidsbook_core::UserId;

use crate::Role;

/// JWT claims model.
///
/// The role is carried for diagnostics only; the credential service re-reads
/// the current role from the user store on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user id).
    pub sub: UserId,

    /// Role at issue time.
    pub role: Role,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("malformed or badly signed token")]
    Malformed,

    #[error("token could not be issued")]
    Encoding,
}

/// Deterministically validate JWT claims against `now`.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

/// Decodes + verifies a bearer token into claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// HS256 signer/validator over a shared secret.
#[derive(Clone)]
pub struct Hs256Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl core::fmt::Debug for Hs256Jwt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256Jwt").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl Hs256Jwt {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Mint a signed token for `user_id`, valid for the configured TTL.
    pub fn issue(&self, user_id: UserId, role: Role, now: DateTime<Utc>) -> Result<String, TokenValidationError> {
        let claims = JwtClaims {
            sub: user_id,
            role,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|_| TokenValidationError::Encoding)
    }
}

impl JwtValidator for Hs256Jwt {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        // Time-window checks use our own RFC 3339 claims, not `exp`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.decoding, &validation)
            .map_err(|_| TokenValidationError::Malformed)?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T09:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn issued_tokens_validate_within_ttl() {
        let jwt = Hs256Jwt::new("secret", Duration::minutes(30));
        let uid = UserId::new();
        let token = jwt.issue(uid, Role::Teacher, test_time()).unwrap();

        let claims = jwt.validate(&token, test_time() + Duration::minutes(5)).unwrap();
        assert_eq!(claims.sub, uid);
        assert_eq!(claims.role, Role::Teacher);
    }

    #[test]
    fn expired_and_future_tokens_are_rejected() {
        let jwt = Hs256Jwt::new("secret", Duration::minutes(30));
        let token = jwt.issue(UserId::new(), Role::Student, test_time()).unwrap();

        assert_eq!(
            jwt.validate(&token, test_time() + Duration::minutes(30)),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            jwt.validate(&token, test_time() - Duration::seconds(1)),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn wrong_secret_is_malformed() {
        let a = Hs256Jwt::new("secret-a", Duration::minutes(30));
        let b = Hs256Jwt::new("secret-b", Duration::minutes(30));
        let token = a.issue(UserId::new(), Role::Student, test_time()).unwrap();

        assert_eq!(b.validate(&token, test_time()), Err(TokenValidationError::Malformed));
        assert_eq!(a.validate("garbage", test_time()), Err(TokenValidationError::Malformed));
    }

    #[test]
    fn inverted_window_is_rejected_by_claim_validation() {
        let claims = JwtClaims {
            sub: UserId::new(),
            role: Role::Student,
            issued_at: test_time(),
            expires_at: test_time(),
        };
        assert_eq!(
            validate_claims(&claims, test_time()),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }
}
