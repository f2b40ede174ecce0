//! Membership mutations, planned as pure functions.
//!
//! The store applies a plan inside one transaction together with the
//! notifications it produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kidsbook_auth::Role;
use kidsbook_core::{DomainError, DomainResult, GroupId, UserId};

use crate::Group;

/// A (user, group) pair. Unique per pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub user: UserId,
    pub group: GroupId,
    pub joined_at: DateTime<Utc>,
}

/// The user being added, with the facts the fan-out needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberCandidate {
    pub user_id: UserId,
    pub role: Role,
}

/// Users to insert when `candidate` joins `group`.
///
/// - `Conflict` if the candidate already is a member
/// - a Teacher brings along every one of their `virtual_students` not yet in
///   the group
///
/// The candidate is always first in the returned list.
pub fn plan_add<F>(
    group: GroupId,
    candidate: MemberCandidate,
    virtual_students: &[UserId],
    is_member: F,
) -> DomainResult<Vec<UserId>>
where
    F: Fn(UserId, GroupId) -> bool,
{
    if is_member(candidate.user_id, group) {
        return Err(DomainError::conflict("User is already a member of this group."));
    }

    let mut added = vec![candidate.user_id];
    if candidate.role.is_teacher() {
        for vs in virtual_students {
            if !is_member(*vs, group) && !added.contains(vs) {
                added.push(*vs);
            }
        }
    }
    Ok(added)
}

/// Validate removing `user` from `group`.
pub fn plan_remove(group: &Group, user: UserId, is_member: bool) -> DomainResult<()> {
    if group.is_creator(user) {
        return Err(DomainError::invalid_operation("Cannot delete the Creator from the group."));
    }
    if !is_member {
        return Err(DomainError::not_found("membership"));
    }
    Ok(())
}
