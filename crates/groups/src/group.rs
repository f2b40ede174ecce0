use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use kidsbook_auth::Identity;
use kidsbook_core::coerce::{coerce_opt_string, coerce_string};
use kidsbook_core::{DomainError, DomainResult, Entity, GroupId, UserId};

const MAX_NAME_LEN: usize = 120;

/// A classroom group.
///
/// # Invariants
/// - `creator` is a Teacher and is always a member
/// - `name` is unique across groups (exact, case-sensitive); enforced by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    pub picture: Option<String>,
    pub creator: UserId,
    pub created_at: DateTime<Utc>,
}

impl Entity for Group {
    type Id = GroupId;

    fn id(&self) -> GroupId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Command to create a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroup {
    pub group_id: GroupId,
    pub name: String,
    pub description: Option<String>,
    pub picture: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl Group {
    pub fn create(cmd: CreateGroup, creator: &Identity) -> DomainResult<Self> {
        if !creator.role.is_teacher() {
            return Err(DomainError::invalid_operation("only teachers can create groups"));
        }
        Ok(Self {
            id: cmd.group_id,
            name: validate_name(&cmd.name)?,
            description: cmd.description.unwrap_or_default(),
            picture: cmd.picture,
            creator: creator.user_id,
            created_at: cmd.occurred_at,
        })
    }

    pub fn is_creator(&self, user: UserId) -> bool {
        self.creator == user
    }
}

fn validate_name(raw: &str) -> DomainResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(DomainError::validation("group name cannot be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "group name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

/// Allow-listed partial update of a group's details.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupDetailPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub picture: Option<Option<String>>,
}

impl GroupDetailPatch {
    pub const FIELDS: [&'static str; 3] = ["name", "description", "picture"];

    /// Parse every allow-listed field; anything else (`creator`, `id`, ...) is ignored.
    pub fn parse(body: &Map<String, Value>) -> DomainResult<Self> {
        let mut patch = Self::default();
        for (field, value) in body {
            match field.as_str() {
                "name" => patch.name = Some(validate_name(&coerce_string(field, value)?)?),
                "description" => patch.description = Some(coerce_string(field, value)?),
                "picture" => patch.picture = Some(coerce_opt_string(field, value)?),
                _ => {}
            }
        }
        Ok(patch)
    }

    pub fn apply(self, group: &mut Group) {
        if let Some(name) = self.name {
            group.name = name;
        }
        if let Some(description) = self.description {
            group.description = description;
        }
        if let Some(picture) = self.picture {
            group.picture = picture;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kidsbook_auth::Role;
    use serde_json::json;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn create(name: &str, role: Role) -> DomainResult<Group> {
        Group::create(
            CreateGroup {
                group_id: GroupId::new(),
                name: name.to_string(),
                description: None,
                picture: None,
                occurred_at: test_time(),
            },
            &Identity::new(UserId::new(), role),
        )
    }

    #[test]
    fn create_group_trims_name_and_records_creator() {
        let g = create("  Math  ", Role::Teacher).unwrap();
        assert_eq!(g.name, "Math");
        assert!(g.is_creator(g.creator));
    }

    #[test]
    fn create_group_rejects_empty_name() {
        match create("   ", Role::Teacher).unwrap_err() {
            DomainError::Validation(_) => {}
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn students_cannot_create_groups() {
        assert!(create("Math", Role::Student).is_err());
    }

    #[test]
    fn detail_patch_ignores_creator_field() {
        let mut g = create("Math", Role::Teacher).unwrap();
        let creator = g.creator;
        let body = json!({ "creator": UserId::new().to_string(), "description": "Sec 1" });

        GroupDetailPatch::parse(body.as_object().unwrap()).unwrap().apply(&mut g);

        assert_eq!(g.creator, creator);
        assert_eq!(g.description, "Sec 1");
    }
}
