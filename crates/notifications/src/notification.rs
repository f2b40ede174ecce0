use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kidsbook_core::{CommentId, Entity, GroupId, NotificationId, PostId, UserId};
use kidsbook_events::Event;

/// An immutable notification addressed to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user: UserId,
    pub group: GroupId,
    pub post: Option<PostId>,
    pub comment: Option<CommentId>,
    pub action_user: Option<UserId>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for Notification {
    type Id = NotificationId;

    fn id(&self) -> NotificationId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Event for Notification {
    fn event_type(&self) -> &'static str {
        "notification.created"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// A notification before it is stamped with an id and time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub user: UserId,
    pub group: GroupId,
    pub post: Option<PostId>,
    pub comment: Option<CommentId>,
    pub action_user: Option<UserId>,
    pub content: String,
}

impl NotificationDraft {
    pub fn added_to_group(user: UserId, group: GroupId, group_name: &str) -> Self {
        Self::plain(user, group, format!("You have been added to group {group_name}"))
    }

    pub fn removed_from_group(user: UserId, group: GroupId, group_name: &str) -> Self {
        Self::plain(user, group, format!("You have been removed from group {group_name}"))
    }

    pub fn commented_on_post(
        author: UserId,
        group: GroupId,
        post: PostId,
        comment: CommentId,
        actor: UserId,
        actor_name: &str,
    ) -> Self {
        Self {
            user: author,
            group,
            post: Some(post),
            comment: Some(comment),
            action_user: Some(actor),
            content: format!("{actor_name} commented on your post"),
        }
    }

    pub fn liked_post(author: UserId, group: GroupId, post: PostId, actor: UserId, actor_name: &str) -> Self {
        Self {
            user: author,
            group,
            post: Some(post),
            comment: None,
            action_user: Some(actor),
            content: format!("{actor_name} liked your post"),
        }
    }

    fn plain(user: UserId, group: GroupId, content: String) -> Self {
        Self {
            user,
            group,
            post: None,
            comment: None,
            action_user: None,
            content,
        }
    }

    pub fn stamp(self, now: DateTime<Utc>) -> Notification {
        Notification {
            id: NotificationId::new(),
            user: self.user,
            group: self.group,
            post: self.post,
            comment: self.comment,
            action_user: self.action_user,
            content: self.content,
            created_at: now,
        }
    }
}

/// Unseen counter for one user. Incremented per notification, reset on demand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnseenCount {
    pub number_of_unseen: u32,
}

impl UnseenCount {
    pub fn bump(&mut self) {
        self.number_of_unseen = self.number_of_unseen.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.number_of_unseen = 0;
    }
}
