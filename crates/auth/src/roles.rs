use core::str::FromStr;

use serde::{Deserialize, Serialize};

use kidsbook_core::DomainError;

/// Closed set of user roles.
///
/// Every user has exactly one role. Call sites ask capability questions
/// (`is_teacher`, `sees_private_profiles`, ...) instead of comparing ranks.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Supervising adult; creates groups and moderates content.
    Teacher,
    /// A child with their own credentials.
    Student,
    /// A teacher-operated proxy student without credentials of its own.
    VirtualStudent,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Teacher, Role::Student, Role::VirtualStudent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
            Role::VirtualStudent => "virtual_student",
        }
    }

    pub fn is_teacher(&self) -> bool {
        matches!(self, Role::Teacher)
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, Role::VirtualStudent)
    }

    /// Whether member listings show private profile fields.
    pub fn sees_private_profiles(&self) -> bool {
        self.is_teacher()
    }

    /// Whether survey/game listings include aggregate stats.
    pub fn sees_stats(&self) -> bool {
        self.is_teacher()
    }

    /// Whether post views show the uncensored text and soft-deleted rows.
    pub fn sees_moderation_view(&self) -> bool {
        self.is_teacher()
    }

    /// Whether this role must be attached to a supervising teacher.
    pub fn requires_teacher(&self) -> bool {
        !self.is_teacher()
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown role '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_teachers_hold_privileged_capabilities() {
        for role in Role::ALL {
            assert_eq!(role.sees_private_profiles(), role == Role::Teacher);
            assert_eq!(role.sees_stats(), role == Role::Teacher);
            assert_eq!(role.requires_teacher(), role != Role::Teacher);
        }
    }

    #[test]
    fn parses_its_own_display() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("admin".parse::<Role>().is_err());
    }
}
