use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use kidsbook_auth::{Action, ResourceRef, Session, authorize};
use kidsbook_core::{DomainError, GroupId, UserId};
use kidsbook_groups::Group;
use kidsbook_identity::{
    GroupActivity, PrivateProfile, ProfilePatch, ProfileView, RegisterUser, RegistrationKind, User, UserSettings,
    UserSettingsPatch, normalize_email, project_profile,
};
use kidsbook_notifications::NotificationDraft;

use super::{ServiceResult, Services, notify_all, optional_str, required_str};

/// A profile plus, on private views, per-group activity.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub profile: ProfileView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<BTreeMap<GroupId, GroupActivity>>,
}

/// The bootstrap teacher and a token for it. `created` is false when the
/// account already existed.
#[derive(Debug, Clone)]
pub struct BootstrapOutcome {
    pub teacher: User,
    pub token: String,
    pub created: bool,
}

/// Result of a teacher logging in as one of their virtual students.
#[derive(Debug, Clone, Serialize)]
pub struct VirtualLogin {
    pub token: String,
    pub user: PrivateProfile,
}

impl Services {
    /// Register an account. A new virtual student joins every group of its teacher.
    pub fn register_user(&self, session: Option<&Session>, body: &Map<String, Value>) -> ServiceResult<PrivateProfile> {
        let now = Utc::now();
        let (user, pushes) = self.command(|t| {
            authorize(session, Action::RegisterUser, &ResourceRef::Global, &*t)?;

            let teacher = optional_str(body, "teacher")?
                .map(|raw| UserId::from_str(&raw))
                .transpose()?;
            let cmd = RegisterUser {
                user_id: UserId::new(),
                kind: RegistrationKind::from_str(&required_str(body, "type")?)?,
                username: required_str(body, "username")?,
                email_address: required_str(body, "email_address")?,
                realname: optional_str(body, "realname")?.unwrap_or_default(),
                description: optional_str(body, "description")?,
                teacher,
                occurred_at: now,
            };
            let teacher_row = teacher.map(|id| t.user(id).cloned()).transpose()?;
            let user = User::register(cmd, teacher_row.as_ref())?;
            t.insert_user(user.clone())?;

            let mut pushes = Vec::new();
            if let (true, Some(teacher)) = (user.role.is_virtual(), user.teacher) {
                let groups: Vec<Group> = t.groups_of(teacher).into_iter().cloned().collect();
                for group in &groups {
                    t.insert_membership(user.id, group.id, now)?;
                }
                pushes = notify_all(
                    t,
                    groups
                        .iter()
                        .map(|g| NotificationDraft::added_to_group(user.id, g.id, &g.name)),
                    now,
                );
            }
            Ok((user, pushes))
        })?;

        tracing::info!(user_id = %user.id, role = %user.role, "user registered");
        self.deliver(&pushes);
        Ok(PrivateProfile::from(&user))
    }

    pub fn view_user(&self, session: Option<&Session>, user: UserId) -> ServiceResult<UserProfile> {
        self.query(|t| {
            let caller = authorize(session, Action::ViewUser, &ResourceRef::User(user), t)?;
            let row = t.user(user)?;
            let profile = project_profile(row, &caller);
            let stats = profile.is_private().then(|| {
                t.groups_of(user)
                    .into_iter()
                    .map(|g| (g.id, t.group_activity(user, g.id)))
                    .collect()
            });
            Ok(UserProfile { profile, stats })
        })
    }

    /// Allow-listed profile update, by the user or a teacher steward.
    pub fn update_user(
        &self,
        session: Option<&Session>,
        user: UserId,
        body: &Map<String, Value>,
    ) -> ServiceResult<PrivateProfile> {
        self.command(|t| {
            authorize(session, Action::UpdateUser, &ResourceRef::User(user), &*t)?;
            let patch = ProfilePatch::parse(body)?;
            t.ensure_profile_unique(user, patch.username.as_deref(), patch.email_address.as_deref())?;
            let row = t.user_mut(user)?;
            patch.apply(row);
            tracing::info!(user_id = %user, "profile updated");
            Ok(PrivateProfile::from(&*row))
        })
    }

    pub fn user_settings(&self, session: Option<&Session>) -> ServiceResult<UserSettings> {
        self.query(|t| {
            let caller = authorize(session, Action::ViewUserSettings, &ResourceRef::Global, t)?;
            Ok(t.user(caller.user_id)?.settings)
        })
    }

    pub fn update_user_settings(&self, session: Option<&Session>, body: &Map<String, Value>) -> ServiceResult<UserSettings> {
        self.command(|t| {
            let caller = authorize(session, Action::UpdateUserSettings, &ResourceRef::Global, &*t)?;
            let patch = UserSettingsPatch::parse(body)?;
            let row = t.user_mut(caller.user_id)?;
            patch.apply(&mut row.settings);
            Ok(row.settings)
        })
    }

    /// The caller's own virtual students.
    pub fn virtual_users(&self, session: Option<&Session>) -> ServiceResult<Vec<PrivateProfile>> {
        self.query(|t| {
            let caller = authorize(session, Action::ListVirtualUsers, &ResourceRef::Global, t)?;
            Ok(t.virtual_students_of(caller.user_id)
                .into_iter()
                .filter_map(|id| t.user(id).ok())
                .map(PrivateProfile::from)
                .collect())
        })
    }

    /// Mint a session for one of the caller's virtual students, found by email.
    pub fn login_as_virtual(&self, session: Option<&Session>, body: &Map<String, Value>) -> ServiceResult<VirtualLogin> {
        let target = self.query(|t| {
            // An unknown address resolves to the nil id, which the directory
            // never knows, so authentication and role failures still come first.
            let found = required_str(body, "email_address")
                .and_then(|raw| normalize_email(&raw))
                .ok()
                .and_then(|email| t.user_by_email(&email));
            let target_id = found.map_or(UserId::from_uuid(Uuid::nil()), |u| u.id);
            let caller = authorize(session, Action::LoginAsVirtual, &ResourceRef::VirtualStudent(target_id), t)?;
            let target = found.ok_or_else(|| DomainError::not_found("virtual user"))?;
            tracing::info!(teacher = %caller.user_id, virtual_user = %target.id, "login as virtual user");
            Ok(target.clone())
        })?;

        let token = self.credentials.issue(target.id, target.role)?;
        Ok(VirtualLogin {
            token,
            user: PrivateProfile::from(&target),
        })
    }

    pub fn user_groups(&self, session: Option<&Session>, user: UserId) -> ServiceResult<Vec<Group>> {
        self.query(|t| {
            authorize(session, Action::ListUserGroups, &ResourceRef::User(user), t)?;
            Ok(t.groups_of(user).into_iter().cloned().collect())
        })
    }

    /// Revoke the token the caller presented.
    pub fn logout(&self, session: Option<&Session>) -> ServiceResult<()> {
        let caller = self.query(|t| Ok(authorize(session, Action::Logout, &ResourceRef::Global, t)?))?;
        if let Some(s) = session {
            self.credentials.revoke(&s.token)?;
        }
        tracing::info!(user_id = %caller.user_id, "logged out");
        Ok(())
    }

    /// Create the first teacher account if no user owns `email_address` yet,
    /// and return a token for it.
    pub fn bootstrap_teacher(&self, username: &str, email_address: &str) -> ServiceResult<BootstrapOutcome> {
        let email_address = normalize_email(email_address)?;
        let (teacher, created) = self.command(|t| {
            if let Some(existing) = t.user_by_email(&email_address) {
                if !existing.is_teacher() {
                    return Err(DomainError::conflict("bootstrap account exists and is not a teacher").into());
                }
                return Ok((existing.clone(), false));
            }
            let teacher = User::teacher(username, &email_address, Utc::now())?;
            t.insert_user(teacher.clone())?;
            tracing::info!(user_id = %teacher.id, username = %teacher.username, "bootstrap teacher created");
            Ok((teacher, true))
        })?;
        let token = self.credentials.issue(teacher.id, teacher.role)?;
        Ok(BootstrapOutcome { teacher, token, created })
    }
}
