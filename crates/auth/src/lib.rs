//! `kidsbook-auth` — authentication/authorization boundary.
//!
//! This crate is decoupled from HTTP and storage: the engine receives ids and
//! re-resolves every fact it needs through an [`AccessDirectory`].

pub mod authorize;
pub mod blacklist;
pub mod claims;
pub mod policy;
pub mod principal;
pub mod roles;
pub mod session;

pub use authorize::{
    AccessDirectory, AuthorizationExplanation, AuthzError, Denial, DenialKind, PredicateOutcome,
    ResourceRef, Stewards, Stewardship, authorize, explain_authorization,
};
pub use blacklist::{BlacklistError, InMemoryTokenBlacklist, TokenBlacklist};
pub use claims::{Hs256Jwt, JwtClaims, JwtValidator, TokenValidationError, validate_claims};
pub use policy::{Action, Predicate, policy};
pub use principal::{Identity, Session};
pub use roles::Role;
pub use session::{CredentialError, CredentialService};
