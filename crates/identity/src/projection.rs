//! Role-dependent projection of user rows.

use chrono::{DateTime, Utc};
use serde::Serialize;

use kidsbook_auth::{Identity, Role};
use kidsbook_core::UserId;

use crate::User;

/// Full profile: shown to teachers and to the user themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrivateProfile {
    pub id: UserId,
    pub username: String,
    pub email_address: String,
    pub realname: String,
    pub description: String,
    pub profile_photo: Option<String>,
    pub role: Role,
    pub teacher: Option<UserId>,
    pub is_active: bool,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
}

/// Public profile: what students see of each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicProfile {
    pub id: UserId,
    pub username: String,
    pub description: String,
    pub profile_photo: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProfileView {
    Private(PrivateProfile),
    Public(PublicProfile),
}

impl ProfileView {
    pub fn id(&self) -> UserId {
        match self {
            ProfileView::Private(p) => p.id,
            ProfileView::Public(p) => p.id,
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, ProfileView::Private(_))
    }
}

impl From<&User> for PrivateProfile {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            email_address: u.email_address.clone(),
            realname: u.realname.clone(),
            description: u.description.clone(),
            profile_photo: u.profile_photo.clone(),
            role: u.role,
            teacher: u.teacher,
            is_active: u.is_active,
            is_superuser: u.is_teacher(),
            created_at: u.created_at,
        }
    }
}

impl From<&User> for PublicProfile {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            description: u.description.clone(),
            profile_photo: u.profile_photo.clone(),
            is_active: u.is_active,
            is_superuser: u.is_teacher(),
        }
    }
}

/// Project `user` for `viewer`.
pub fn project_profile(user: &User, viewer: &Identity) -> ProfileView {
    if viewer.role.sees_private_profiles() || viewer.user_id == user.id {
        ProfileView::Private(user.into())
    } else {
        ProfileView::Public(user.into())
    }
}

/// Per-group activity counters shown on a profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupActivity {
    pub num_comments: usize,
    pub num_likes_given: usize,
    pub num_likes_received: usize,
}
