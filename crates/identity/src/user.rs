use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kidsbook_auth::Role;
use kidsbook_core::{DomainError, DomainResult, Entity, UserId};

// ─────────────────────────────────────────────────────────────────────────────
// User settings
// ─────────────────────────────────────────────────────────────────────────────

/// Per-user preferences (one-to-one with the user).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub receive_notifications: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            receive_notifications: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A registered account.
///
/// # Invariants
/// - exactly one role
/// - a `Student` or `VirtualStudent` always has a teacher, and that teacher is a `Teacher`
/// - a `Teacher` has no teacher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email_address: String,
    pub realname: String,
    pub description: String,
    pub profile_photo: Option<String>,
    pub role: Role,
    pub teacher: Option<UserId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub settings: UserSettings,
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> UserId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl User {
    /// Create a user from a validated registration.
    ///
    /// `teacher` must be the resolved row for `cmd.teacher` (if any).
    pub fn register(cmd: RegisterUser, teacher: Option<&User>) -> DomainResult<Self> {
        let role = cmd.kind.role();

        let username = validate_username(&cmd.username)?;
        let email_address = normalize_email(&cmd.email_address)?;

        let teacher_id = match (role.requires_teacher(), cmd.teacher) {
            (true, None) => {
                return Err(DomainError::validation(format!("a {role} must be assigned a teacher")));
            }
            (true, Some(id)) => {
                let t = teacher.filter(|t| t.id == id).ok_or_else(|| DomainError::not_found("teacher"))?;
                if !t.role.is_teacher() {
                    return Err(DomainError::validation("the assigned teacher is not a teacher"));
                }
                Some(id)
            }
            (false, _) => None,
        };

        Ok(Self {
            id: cmd.user_id,
            username,
            email_address,
            realname: cmd.realname.trim().to_string(),
            description: cmd.description.unwrap_or_default(),
            profile_photo: None,
            role,
            teacher: teacher_id,
            is_active: true,
            created_at: cmd.occurred_at,
            settings: UserSettings::default(),
        })
    }

    /// Bootstrap a teacher without going through a registering caller.
    pub fn teacher(username: &str, email_address: &str, occurred_at: DateTime<Utc>) -> DomainResult<Self> {
        Self::register(
            RegisterUser {
                user_id: UserId::new(),
                kind: RegistrationKind::Superuser,
                username: username.to_string(),
                email_address: email_address.to_string(),
                realname: username.to_string(),
                description: None,
                teacher: None,
                occurred_at,
            },
            None,
        )
    }

    pub fn is_teacher(&self) -> bool {
        self.role.is_teacher()
    }

    /// A virtual student supervised by `teacher`.
    pub fn is_virtual_of(&self, teacher: UserId) -> bool {
        self.role.is_virtual() && self.teacher == Some(teacher)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registration
// ─────────────────────────────────────────────────────────────────────────────

/// Account type as sent by clients (`SUPERUSER`, `USER`, `VIRTUAL_USER`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationKind {
    Superuser,
    User,
    VirtualUser,
}

impl RegistrationKind {
    pub fn role(&self) -> Role {
        match self {
            RegistrationKind::Superuser => Role::Teacher,
            RegistrationKind::User => Role::Student,
            RegistrationKind::VirtualUser => Role::VirtualStudent,
        }
    }
}

impl FromStr for RegistrationKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "SUPERUSER" => Ok(Self::Superuser),
            "USER" => Ok(Self::User),
            "VIRTUAL_USER" => Ok(Self::VirtualUser),
            other => Err(DomainError::validation(format!("unknown account type '{other}'"))),
        }
    }
}

/// Command to register a new account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUser {
    pub user_id: UserId,
    pub kind: RegistrationKind,
    pub username: String,
    pub email_address: String,
    pub realname: String,
    pub description: Option<String>,
    pub teacher: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

const MAX_USERNAME_LEN: usize = 50;

pub(crate) fn validate_username(raw: &str) -> DomainResult<String> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(DomainError::validation("username cannot be empty"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(DomainError::validation(format!(
            "username cannot exceed {MAX_USERNAME_LEN} characters"
        )));
    }
    Ok(username.to_string())
}

/// Validate an email address and lowercase its domain part.
pub fn normalize_email(raw: &str) -> DomainResult<String> {
    let raw = raw.trim();
    let (local, domain) = raw
        .rsplit_once('@')
        .ok_or_else(|| DomainError::validation("enter a valid email address"))?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(DomainError::validation("enter a valid email address"));
    }
    Ok(format!("{local}@{}", domain.to_lowercase()))
}
