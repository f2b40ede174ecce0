//! Static action → predicate table.
//!
//! Each action lists its predicates in canonical stage order
//! (Authenticated → Role → Membership → Ownership). The engine evaluates them
//! left to right and stops at the first failure.

use serde::Serialize;

use crate::Role;

/// One independent authorization check.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "predicate", content = "role")]
pub enum Predicate {
    /// Session present, active, not blacklisted.
    Authenticated,
    /// Caller holds the given role.
    Role(Role),
    /// Caller is a member of the target's group.
    Membership,
    /// Caller owns the target or is a steward of it.
    Ownership,
}

impl Predicate {
    /// Position in the canonical evaluation order.
    pub fn stage(&self) -> u8 {
        match self {
            Predicate::Authenticated => 0,
            Predicate::Role(_) => 1,
            Predicate::Membership => 2,
            Predicate::Ownership => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Predicate::Authenticated => "authenticated",
            Predicate::Role(_) => "role",
            Predicate::Membership => "membership",
            Predicate::Ownership => "ownership",
        }
    }
}

/// Every externally triggerable action.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    // groups
    ListGroups,
    CreateGroup,
    ViewGroup,
    UpdateGroup,
    DeleteGroup,
    AddMember,
    RemoveMember,
    ListMembers,
    ViewGroupSettings,
    UpdateGroupSettings,

    // posts / comments
    ListPosts,
    CreatePost,
    ViewPost,
    DeletePost,
    LikePost,
    SharePost,
    FlagPost,
    CommentOnPost,
    ListComments,
    DeleteComment,
    LikeComment,
    FlagComment,

    // surveys / games
    ListSurveys,
    CreateSurvey,
    AnswerSurvey,
    ListGames,
    CreateGame,
    AnswerGame,

    // users
    RegisterUser,
    ViewUser,
    UpdateUser,
    ViewUserSettings,
    UpdateUserSettings,
    ListVirtualUsers,
    LoginAsVirtual,
    ListUserGroups,
    ListOwnPosts,
    Logout,

    // notifications
    ListNotifications,
    ResetUnseenNotifications,
}

use Predicate::{Authenticated as Auth, Membership as Member, Ownership as Owner};

const TEACHER: Predicate = Predicate::Role(Role::Teacher);

const AUTH_ONLY: &[Predicate] = &[Auth];
const TEACHER_ONLY: &[Predicate] = &[Auth, TEACHER];
const MEMBER: &[Predicate] = &[Auth, Member];
const TEACHER_MEMBER: &[Predicate] = &[Auth, TEACHER, Member];
const MEMBER_OWNER: &[Predicate] = &[Auth, Member, Owner];
const TEACHER_OWNER: &[Predicate] = &[Auth, TEACHER, Owner];
const OWNER: &[Predicate] = &[Auth, Owner];

/// Ordered predicates for an action.
pub fn policy(action: Action) -> &'static [Predicate] {
    use Action::*;
    match action {
        ListGroups | CreateGroup => TEACHER_ONLY,
        ViewGroup | ListMembers | ViewGroupSettings => MEMBER,
        UpdateGroup => MEMBER_OWNER,
        DeleteGroup => TEACHER_OWNER,
        AddMember | RemoveMember => TEACHER_ONLY,
        UpdateGroupSettings => TEACHER_MEMBER,

        ListPosts | CreatePost | ViewPost | ListComments => MEMBER,
        LikePost | SharePost | FlagPost | CommentOnPost => MEMBER,
        LikeComment | FlagComment => MEMBER,
        DeletePost | DeleteComment => MEMBER_OWNER,

        ListSurveys | ListGames | AnswerSurvey | AnswerGame => MEMBER,
        CreateSurvey | CreateGame => TEACHER_MEMBER,

        RegisterUser | ListVirtualUsers => TEACHER_ONLY,
        LoginAsVirtual => TEACHER_OWNER,
        UpdateUser | ListUserGroups => OWNER,
        ViewUser | ViewUserSettings | UpdateUserSettings | ListOwnPosts | Logout => AUTH_ONLY,

        ListNotifications | ResetUnseenNotifications => AUTH_ONLY,
    }
}

impl Action {
    pub const ALL: &'static [Action] = &[
        Action::ListGroups,
        Action::CreateGroup,
        Action::ViewGroup,
        Action::UpdateGroup,
        Action::DeleteGroup,
        Action::AddMember,
        Action::RemoveMember,
        Action::ListMembers,
        Action::ViewGroupSettings,
        Action::UpdateGroupSettings,
        Action::ListPosts,
        Action::CreatePost,
        Action::ViewPost,
        Action::DeletePost,
        Action::LikePost,
        Action::SharePost,
        Action::FlagPost,
        Action::CommentOnPost,
        Action::ListComments,
        Action::DeleteComment,
        Action::LikeComment,
        Action::FlagComment,
        Action::ListSurveys,
        Action::CreateSurvey,
        Action::AnswerSurvey,
        Action::ListGames,
        Action::CreateGame,
        Action::AnswerGame,
        Action::RegisterUser,
        Action::ViewUser,
        Action::UpdateUser,
        Action::ViewUserSettings,
        Action::UpdateUserSettings,
        Action::ListVirtualUsers,
        Action::LoginAsVirtual,
        Action::ListUserGroups,
        Action::ListOwnPosts,
        Action::Logout,
        Action::ListNotifications,
        Action::ResetUnseenNotifications,
    ];

    /// Client-facing message for a denial at `predicate`.
    pub fn denial_message(&self, predicate: Predicate) -> &'static str {
        match (self, predicate) {
            (Action::UpdateGroup, Predicate::Ownership) => "Only the creator can modify group's details.",
            (Action::UpdateGroupSettings, Predicate::Role(_)) => {
                "Only superusers can modify group's settings."
            }
            (Action::DeleteGroup, Predicate::Ownership) => "Only the creator can delete the group.",
            (Action::UpdateUser, Predicate::Ownership) => "Not allowed to update this user.",
            (Action::LoginAsVirtual, Predicate::Ownership) => {
                "Only the teacher of this virtual user can log in as it."
            }
            (Action::DeletePost | Action::DeleteComment, Predicate::Ownership) => {
                "Only the author or the group creator can delete this."
            }
            (_, Predicate::Role(_)) => "Only teachers can perform this action.",
            (_, Predicate::Membership) => "You are not a member of this group.",
            (_, Predicate::Ownership) => "You do not own this resource.",
            (_, Predicate::Authenticated) => "Authentication required.",
        }
    }
}
