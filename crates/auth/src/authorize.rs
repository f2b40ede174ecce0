use serde::Serialize;
use thiserror::Error;

use kidsbook_core::{CommentId, GameId, GroupId, PostId, SurveyId, UserId};

use crate::{Action, Identity, Predicate, Session, policy};

/// Reference to the resource an action targets.
///
/// The engine only ever sees ids; every fact about the target (owning group,
/// owner, stewards) is re-resolved through the [`AccessDirectory`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum ResourceRef {
    /// No specific resource (list all groups, register a user, ...).
    Global,
    Group(GroupId),
    Post(PostId),
    Comment(CommentId),
    Survey(SurveyId),
    Game(GameId),
    /// A user profile.
    User(UserId),
    /// A virtual student account, as something its teacher can act as.
    VirtualStudent(UserId),
}

impl ResourceRef {
    pub fn kind(&self) -> &'static str {
        match self {
            ResourceRef::Global => "resource",
            ResourceRef::Group(_) => "group",
            ResourceRef::Post(_) => "post",
            ResourceRef::Comment(_) => "comment",
            ResourceRef::Survey(_) => "survey",
            ResourceRef::Game(_) => "game",
            ResourceRef::User(_) => "user",
            ResourceRef::VirtualStudent(_) => "virtual user",
        }
    }
}

/// Who besides the owner may mutate a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stewards {
    None,
    /// These specific teachers.
    Users(Vec<UserId>),
    /// Any caller holding the Teacher role.
    AnyTeacher,
}

/// Ownership facts for a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stewardship {
    pub owner: UserId,
    pub stewards: Stewards,
}

impl Stewardship {
    pub fn owned_by(owner: UserId) -> Self {
        Self {
            owner,
            stewards: Stewards::None,
        }
    }

    pub fn with_stewards(owner: UserId, stewards: Vec<UserId>) -> Self {
        Self {
            owner,
            stewards: Stewards::Users(stewards),
        }
    }

    /// Owner, or a Teacher listed as steward.
    pub fn permits(&self, identity: &Identity) -> bool {
        if identity.user_id == self.owner {
            return true;
        }
        if !identity.role.is_teacher() {
            return false;
        }
        match &self.stewards {
            Stewards::None => false,
            Stewards::Users(ids) => ids.contains(&identity.user_id),
            Stewards::AnyTeacher => true,
        }
    }
}

/// Read-only view of the store the engine resolves facts through.
pub trait AccessDirectory {
    /// Owning group of the target, following its foreign chain.
    /// `None` when the target does not exist or is not group-scoped.
    fn group_of(&self, target: &ResourceRef) -> Option<GroupId>;

    fn is_member(&self, user: UserId, group: GroupId) -> bool;

    /// `None` when the target does not exist.
    fn stewardship_of(&self, target: &ResourceRef) -> Option<Stewardship>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    Role,
    Membership,
    Ownership,
}

/// Why a `Forbidden` was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Denial {
    pub action: Action,
    pub kind: DenialKind,
    pub message: String,
}

impl core::fmt::Display for Denial {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("Authentication credentials were not provided or are no longer valid.")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(Denial),

    #[error("{0} not found")]
    NotFound(String),
}

impl AuthzError {
    pub fn denial_kind(&self) -> Option<DenialKind> {
        match self {
            AuthzError::Forbidden(d) => Some(d.kind),
            _ => None,
        }
    }
}

/// Outcome of one predicate during an evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredicateOutcome {
    pub predicate: Predicate,
    pub passed: bool,
    pub detail: String,
}

/// Authorize `action` on `target` for the caller.
///
/// - No IO beyond the directory lookups
/// - Fail-fast: predicate N+1 never runs after a denial
/// - Returns the caller's identity on success
pub fn authorize<D>(
    session: Option<&Session>,
    action: Action,
    target: &ResourceRef,
    directory: &D,
) -> Result<Identity, AuthzError>
where
    D: AccessDirectory + ?Sized,
{
    let mut trace = Vec::new();
    let result = evaluate(session, action, target, directory, &mut trace);
    if let Err(err) = &result {
        tracing::debug!(
            action = ?action,
            target = ?target,
            caller = ?session.map(|s| s.identity.user_id),
            stage = trace.last().map(|o| o.predicate.name()).unwrap_or("resolve"),
            error = %err,
            "authorization denied"
        );
    }
    result
}

fn evaluate<D>(
    session: Option<&Session>,
    action: Action,
    target: &ResourceRef,
    directory: &D,
    trace: &mut Vec<PredicateOutcome>,
) -> Result<Identity, AuthzError>
where
    D: AccessDirectory + ?Sized,
{
    let mut identity: Option<Identity> = None;

    for predicate in policy(action) {
        match *predicate {
            Predicate::Authenticated => match session {
                Some(s) if s.is_usable() => {
                    trace.push(PredicateOutcome {
                        predicate: *predicate,
                        passed: true,
                        detail: format!("session for user {}", s.identity.user_id),
                    });
                    identity = Some(s.identity);
                }
                other => {
                    let detail = match other {
                        None => "no session",
                        Some(s) if s.blacklisted => "token revoked",
                        Some(_) => "account inactive",
                    };
                    trace.push(PredicateOutcome {
                        predicate: *predicate,
                        passed: false,
                        detail: detail.to_string(),
                    });
                    return Err(AuthzError::Unauthenticated);
                }
            },

            Predicate::Role(required) => {
                let caller = identity.ok_or(AuthzError::Unauthenticated)?;
                let passed = caller.role == required;
                trace.push(PredicateOutcome {
                    predicate: *predicate,
                    passed,
                    detail: format!("caller role {}, required {}", caller.role, required),
                });
                if !passed {
                    return Err(deny(action, *predicate, DenialKind::Role));
                }
            }

            Predicate::Membership => {
                let caller = identity.ok_or(AuthzError::Unauthenticated)?;
                let group = directory
                    .group_of(target)
                    .ok_or_else(|| AuthzError::NotFound(target.kind().to_string()))?;
                let passed = directory.is_member(caller.user_id, group);
                trace.push(PredicateOutcome {
                    predicate: *predicate,
                    passed,
                    detail: format!("group {group}"),
                });
                if !passed {
                    return Err(deny(action, *predicate, DenialKind::Membership));
                }
            }

            Predicate::Ownership => {
                let caller = identity.ok_or(AuthzError::Unauthenticated)?;
                let stewardship = directory
                    .stewardship_of(target)
                    .ok_or_else(|| AuthzError::NotFound(target.kind().to_string()))?;
                let passed = stewardship.permits(&caller);
                trace.push(PredicateOutcome {
                    predicate: *predicate,
                    passed,
                    detail: format!("owner {}", stewardship.owner),
                });
                if !passed {
                    return Err(deny(action, *predicate, DenialKind::Ownership));
                }
            }
        }
    }

    identity.ok_or(AuthzError::Unauthenticated)
}

fn deny(action: Action, predicate: Predicate, kind: DenialKind) -> AuthzError {
    AuthzError::Forbidden(Denial {
        action,
        kind,
        message: action.denial_message(predicate).to_string(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub action: Action,
    pub target: ResourceRef,
    pub granted: bool,
    /// Predicates in evaluation order; those after a denial are absent.
    pub evaluated: Vec<PredicateOutcome>,
    /// Predicates that were never reached.
    pub skipped: Vec<Predicate>,
    pub error: Option<String>,
}

/// Run the same evaluation as [`authorize`] and report every step.
pub fn explain_authorization<D>(
    session: Option<&Session>,
    action: Action,
    target: &ResourceRef,
    directory: &D,
) -> AuthorizationExplanation
where
    D: AccessDirectory + ?Sized,
{
    let mut evaluated = Vec::new();
    let result = evaluate(session, action, target, directory, &mut evaluated);
    let skipped = policy(action)
        .iter()
        .skip(evaluated.len())
        .copied()
        .collect();

    AuthorizationExplanation {
        action,
        target: *target,
        granted: result.is_ok(),
        evaluated,
        skipped,
        error: result.err().map(|e| e.to_string()),
    }
}
