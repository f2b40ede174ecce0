//! Role-dependent views of posts and comments.
//!
//! Students see censored `content` and never see soft-deleted rows. Teachers
//! see the unfiltered `content` plus `filtered_content` and `is_deleted`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use kidsbook_auth::Role;
use kidsbook_core::{CommentId, GroupId, PostId, UserId};

use crate::{Comment, ContentCensor, Post};

/// Reaction facts collected by the store for one post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostReactions {
    /// Users whose like row is positive.
    pub likes: Vec<UserId>,
    pub shares: Vec<UserId>,
    pub flags: Vec<UserId>,
    pub num_comments: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostView {
    pub id: PostId,
    pub created_at: DateTime<Utc>,
    pub content: String,
    pub creator: UserId,
    pub group: GroupId,
    pub picture: Option<String>,
    pub link: Option<String>,
    pub ogp: Option<String>,
    pub likes: Vec<UserId>,
    pub shares: Vec<UserId>,
    pub flags: Vec<UserId>,
    pub num_comments: usize,
    pub is_sponsored: bool,
    pub is_announcement: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtered_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_deleted: Option<bool>,
}

/// `None` when the viewer must not see the post at all.
pub fn project_post(
    post: &Post,
    reactions: PostReactions,
    viewer: Role,
    censor: &dyn ContentCensor,
) -> Option<PostView> {
    let moderator = viewer.sees_moderation_view();
    if post.is_deleted && !moderator {
        return None;
    }

    let filtered = censor.censor(&post.content);
    let (content, filtered_content, is_deleted) = if moderator {
        (post.content.clone(), Some(filtered), Some(post.is_deleted))
    } else {
        (filtered, None, None)
    };

    Some(PostView {
        id: post.id,
        created_at: post.created_at,
        content,
        creator: post.creator,
        group: post.group,
        picture: post.picture.clone(),
        link: post.link.clone(),
        ogp: post.ogp.clone(),
        likes: reactions.likes,
        shares: reactions.shares,
        flags: reactions.flags,
        num_comments: reactions.num_comments,
        is_sponsored: post.is_sponsored,
        is_announcement: post.is_announcement,
        filtered_content,
        is_deleted,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentView {
    pub id: CommentId,
    pub post: PostId,
    pub creator: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub likes: Vec<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtered_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_deleted: Option<bool>,
}

pub fn project_comment(
    comment: &Comment,
    likes: Vec<UserId>,
    viewer: Role,
    censor: &dyn ContentCensor,
) -> Option<CommentView> {
    let moderator = viewer.sees_moderation_view();
    if comment.is_deleted && !moderator {
        return None;
    }

    let filtered = censor.censor(&comment.content);
    let (content, filtered_content, is_deleted) = if moderator {
        (comment.content.clone(), Some(filtered), Some(comment.is_deleted))
    } else {
        (filtered, None, None)
    };

    Some(CommentView {
        id: comment.id,
        post: comment.post,
        creator: comment.creator,
        content,
        created_at: comment.created_at,
        likes,
        filtered_content,
        is_deleted,
    })
}
