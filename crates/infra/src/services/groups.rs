use chrono::Utc;
use serde_json::{Map, Value};

use kidsbook_auth::{Action, ResourceRef, Session, authorize};
use kidsbook_core::{GroupId, UserId};
use kidsbook_groups::{
    CreateGroup, Group, GroupDetailPatch, GroupSettings, MemberCandidate, SettingsPatch, plan_add, plan_remove,
};
use kidsbook_identity::{ProfileView, project_profile};
use kidsbook_notifications::{Notification, NotificationDraft};

use super::{ServiceResult, Services, notify_all, optional_str, required_str};
use crate::Tables;

impl Services {
    pub fn list_groups(&self, session: Option<&Session>) -> ServiceResult<Vec<Group>> {
        self.query(|t| {
            authorize(session, Action::ListGroups, &ResourceRef::Global, t)?;
            Ok(t.groups().cloned().collect())
        })
    }

    /// Create a group; the creator joins it (with their virtual students).
    pub fn create_group(&self, session: Option<&Session>, body: &Map<String, Value>) -> ServiceResult<Group> {
        let now = Utc::now();
        let (group, pushes) = self.command(|t| {
            let caller = authorize(session, Action::CreateGroup, &ResourceRef::Global, &*t)?;
            let group = Group::create(
                CreateGroup {
                    group_id: GroupId::new(),
                    name: required_str(body, "name")?,
                    description: optional_str(body, "description")?,
                    picture: optional_str(body, "picture")?,
                    occurred_at: now,
                },
                &caller,
            )?;
            t.insert_group(group.clone())?;
            let pushes = add_with_fan_out(t, &group, caller.user_id)?.1;
            Ok((group, pushes))
        })?;

        tracing::info!(group_id = %group.id, name = %group.name, creator = %group.creator, "group created");
        self.deliver(&pushes);
        Ok(group)
    }

    pub fn group_detail(&self, session: Option<&Session>, group: GroupId) -> ServiceResult<Group> {
        self.query(|t| {
            authorize(session, Action::ViewGroup, &ResourceRef::Group(group), t)?;
            Ok(t.group(group)?.clone())
        })
    }

    pub fn update_group(
        &self,
        session: Option<&Session>,
        group: GroupId,
        body: &Map<String, Value>,
    ) -> ServiceResult<Group> {
        self.command(|t| {
            authorize(session, Action::UpdateGroup, &ResourceRef::Group(group), &*t)?;
            let patch = GroupDetailPatch::parse(body)?;
            if let Some(name) = &patch.name {
                t.ensure_group_name_free(name, Some(group))?;
            }
            let row = t.group_mut(group)?;
            patch.apply(row);
            Ok(row.clone())
        })
    }

    pub fn delete_group(&self, session: Option<&Session>, group: GroupId) -> ServiceResult<Group> {
        let removed = self.command(|t| {
            authorize(session, Action::DeleteGroup, &ResourceRef::Group(group), &*t)?;
            Ok(t.remove_group(group)?)
        })?;
        tracing::info!(group_id = %removed.id, "group deleted");
        Ok(removed)
    }

    /// Returns every user that joined: `user`, then any virtual students it brought.
    pub fn add_member(&self, session: Option<&Session>, group: GroupId, user: UserId) -> ServiceResult<Vec<UserId>> {
        let (added, pushes) = self.command(|t| {
            authorize(session, Action::AddMember, &ResourceRef::Group(group), &*t)?;
            let row = t.group(group)?.clone();
            add_with_fan_out(t, &row, user)
        })?;

        tracing::info!(group_id = %group, user_id = %user, added = added.len(), "member added");
        self.deliver(&pushes);
        Ok(added)
    }

    pub fn remove_member(&self, session: Option<&Session>, group: GroupId, user: UserId) -> ServiceResult<()> {
        let now = Utc::now();
        let pushes = self.command(|t| {
            authorize(session, Action::RemoveMember, &ResourceRef::Group(group), &*t)?;
            let row = t.group(group)?.clone();
            plan_remove(&row, user, t.is_member(user, group))?;
            t.remove_membership(user, group)?;
            Ok(notify_all(
                t,
                [NotificationDraft::removed_from_group(user, group, &row.name)],
                now,
            ))
        })?;

        tracing::info!(group_id = %group, user_id = %user, "member removed");
        self.deliver(&pushes);
        Ok(())
    }

    /// Members projected for the caller: teachers see private fields.
    pub fn list_members(&self, session: Option<&Session>, group: GroupId) -> ServiceResult<Vec<ProfileView>> {
        self.query(|t| {
            let caller = authorize(session, Action::ListMembers, &ResourceRef::Group(group), t)?;
            Ok(t.members_of(group)
                .into_iter()
                .filter_map(|id| t.user(id).ok())
                .map(|u| project_profile(u, &caller))
                .collect())
        })
    }

    pub fn group_settings(&self, session: Option<&Session>, group: GroupId) -> ServiceResult<GroupSettings> {
        self.query(|t| {
            authorize(session, Action::ViewGroupSettings, &ResourceRef::Group(group), t)?;
            Ok(*t.settings(group)?)
        })
    }

    pub fn update_group_settings(
        &self,
        session: Option<&Session>,
        group: GroupId,
        body: &Map<String, Value>,
    ) -> ServiceResult<GroupSettings> {
        let settings = self.command(|t| {
            authorize(session, Action::UpdateGroupSettings, &ResourceRef::Group(group), &*t)?;
            let patch = SettingsPatch::parse(body)?;
            let settings = t.settings_mut(group)?;
            patch.apply(settings);
            Ok(*settings)
        })?;
        tracing::info!(group_id = %group, ?settings, "group settings updated");
        Ok(settings)
    }
}

/// Insert `user` and, for a teacher, their virtual students; notify each.
fn add_with_fan_out(
    t: &mut Tables,
    group: &Group,
    user: UserId,
) -> ServiceResult<(Vec<UserId>, Vec<Notification>)> {
    let now = Utc::now();
    let candidate = t.user(user)?;
    let candidate = MemberCandidate {
        user_id: candidate.id,
        role: candidate.role,
    };
    let virtual_students = t.virtual_students_of(user);
    let added = plan_add(group.id, candidate, &virtual_students, |u, g| t.is_member(u, g))?;

    for id in &added {
        t.insert_membership(*id, group.id, now)?;
    }
    let pushes = notify_all(
        t,
        added
            .iter()
            .map(|id| NotificationDraft::added_to_group(*id, group.id, &group.name)),
        now,
    );
    Ok((added, pushes))
}
