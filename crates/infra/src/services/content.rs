use chrono::Utc;
use serde_json::{Map, Value};

use kidsbook_auth::{Action, Identity, ResourceRef, Session, authorize};
use kidsbook_content::reactions::{parse_flag_status, parse_like_value};
use kidsbook_content::{
    Comment, CommentLike, CommentView, ContentAction, CreateComment, CreatePost, Flag, Post, PostLike, PostView,
    Share, gate, project_comment, project_post,
};
use kidsbook_core::{CommentId, DomainError, GroupId, PostId};
use kidsbook_notifications::NotificationDraft;

use super::{ServiceResult, Services, notify_all, required_str};
use crate::Tables;

// ─────────────────────────────────────────────────────────────────────────────
// Posts
// ─────────────────────────────────────────────────────────────────────────────

impl Services {
    /// Posts of a group, newest first. Students never see deleted posts.
    pub fn list_posts(&self, session: Option<&Session>, group: GroupId) -> ServiceResult<Vec<PostView>> {
        self.query(|t| {
            let caller = authorize(session, Action::ListPosts, &ResourceRef::Group(group), t)?;
            Ok(t.posts_in(group)
                .into_iter()
                .filter_map(|p| project_post(p, t.post_reactions(p.id), caller.role, self.censor.as_ref()))
                .collect())
        })
    }

    /// The caller's own live posts across every group, newest first.
    pub fn my_posts(&self, session: Option<&Session>) -> ServiceResult<Vec<PostView>> {
        self.query(|t| {
            let caller = authorize(session, Action::ListOwnPosts, &ResourceRef::Global, t)?;
            Ok(t.posts_by(caller.user_id)
                .into_iter()
                .filter_map(|p| project_post(p, t.post_reactions(p.id), caller.role, self.censor.as_ref()))
                .collect())
        })
    }

    pub fn create_post(
        &self,
        session: Option<&Session>,
        group: GroupId,
        body: &Map<String, Value>,
    ) -> ServiceResult<PostView> {
        let now = Utc::now();
        self.command(|t| {
            let caller = authorize(session, Action::CreatePost, &ResourceRef::Group(group), &*t)?;
            let post = Post::create(CreatePost::parse(body)?, group, caller.user_id, now)?;
            let id = post.id;
            t.insert_post(post);
            tracing::info!(post_id = %id, group_id = %group, creator = %caller.user_id, "post created");
            self.post_view(t, id, &caller)
        })
    }

    pub fn view_post(&self, session: Option<&Session>, post: PostId) -> ServiceResult<PostView> {
        self.query(|t| {
            let caller = authorize(session, Action::ViewPost, &ResourceRef::Post(post), t)?;
            self.post_view(t, post, &caller)
        })
    }

    /// Soft delete, by the author or the group's creator.
    pub fn delete_post(&self, session: Option<&Session>, post: PostId) -> ServiceResult<()> {
        self.command(|t| {
            let caller = authorize(session, Action::DeletePost, &ResourceRef::Post(post), &*t)?;
            t.post_mut(post)?.soft_delete()?;
            tracing::info!(post_id = %post, by = %caller.user_id, "post deleted");
            Ok(())
        })
    }

    /// Upsert the caller's like; a new positive like notifies the author.
    pub fn like_post(&self, session: Option<&Session>, post: PostId, body: &Map<String, Value>) -> ServiceResult<PostLike> {
        let now = Utc::now();
        let (like, pushes) = self.command(|t| {
            let caller = authorize(session, Action::LikePost, &ResourceRef::Post(post), &*t)?;
            let row = live_post(t, post)?.clone();
            gate(t.settings(row.group)?, ContentAction::LikePost)?;

            let like = PostLike {
                user: caller.user_id,
                post,
                like_or_dislike: parse_like_value(body)?,
                created_at: now,
            };
            let previous = t.upsert_post_like(like);
            let newly_liked = like.like_or_dislike && !previous.is_some_and(|p| p.like_or_dislike);

            let mut pushes = Vec::new();
            if newly_liked && row.creator != caller.user_id {
                let actor = t.user(caller.user_id)?.username.clone();
                pushes = notify_all(
                    t,
                    [NotificationDraft::liked_post(row.creator, row.group, post, caller.user_id, &actor)],
                    now,
                );
            }
            Ok((like, pushes))
        })?;

        self.deliver(&pushes);
        Ok(like)
    }

    /// Every call records a new share.
    pub fn share_post(&self, session: Option<&Session>, post: PostId) -> ServiceResult<Share> {
        self.command(|t| {
            let caller = authorize(session, Action::SharePost, &ResourceRef::Post(post), &*t)?;
            let group = live_post(t, post)?.group;
            gate(t.settings(group)?, ContentAction::Share)?;

            let share = Share {
                user: caller.user_id,
                post,
                created_at: Utc::now(),
            };
            t.insert_share(share);
            Ok(share)
        })
    }

    pub fn flag_post(&self, session: Option<&Session>, post: PostId, body: &Map<String, Value>) -> ServiceResult<Flag> {
        self.command(|t| {
            let caller = authorize(session, Action::FlagPost, &ResourceRef::Post(post), &*t)?;
            let group = live_post(t, post)?.group;
            gate(t.settings(group)?, ContentAction::FlagPost)?;

            let flag = Flag {
                user: caller.user_id,
                post,
                comment: None,
                status: parse_flag_status(body)?,
                created_at: Utc::now(),
            };
            t.upsert_flag(flag.clone());
            tracing::info!(post_id = %post, by = %caller.user_id, status = %flag.status, "post flagged");
            Ok(flag)
        })
    }

    fn post_view(&self, t: &Tables, post: PostId, caller: &Identity) -> ServiceResult<PostView> {
        let row = t.post(post)?;
        project_post(row, t.post_reactions(post), caller.role, self.censor.as_ref())
            .ok_or_else(|| DomainError::not_found("post").into())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Comments
// ─────────────────────────────────────────────────────────────────────────────

impl Services {
    pub fn comment_on_post(
        &self,
        session: Option<&Session>,
        post: PostId,
        body: &Map<String, Value>,
    ) -> ServiceResult<CommentView> {
        let now = Utc::now();
        let (view, pushes) = self.command(|t| {
            let caller = authorize(session, Action::CommentOnPost, &ResourceRef::Post(post), &*t)?;
            let row = live_post(t, post)?.clone();
            gate(t.settings(row.group)?, ContentAction::Comment)?;

            let content = required_str(body, "content")?;
            let comment = Comment::create(CreateComment { content }, post, caller.user_id, now)?;
            let comment_id = comment.id;
            let view = project_comment(&comment, Vec::new(), caller.role, self.censor.as_ref())
                .ok_or_else(|| DomainError::not_found("comment"))?;
            t.insert_comment(comment);

            let mut pushes = Vec::new();
            if row.creator != caller.user_id {
                let actor = t.user(caller.user_id)?.username.clone();
                pushes = notify_all(
                    t,
                    [NotificationDraft::commented_on_post(
                        row.creator,
                        row.group,
                        post,
                        comment_id,
                        caller.user_id,
                        &actor,
                    )],
                    now,
                );
            }
            Ok((view, pushes))
        })?;

        self.deliver(&pushes);
        Ok(view)
    }

    /// Comments on a post, oldest first, projected for the caller.
    pub fn list_comments(&self, session: Option<&Session>, post: PostId) -> ServiceResult<Vec<CommentView>> {
        self.query(|t| {
            let caller = authorize(session, Action::ListComments, &ResourceRef::Post(post), t)?;
            let row = t.post(post)?;
            if row.is_deleted && !caller.role.sees_moderation_view() {
                return Err(DomainError::not_found("post").into());
            }
            Ok(t.comments_on(post)
                .into_iter()
                .filter_map(|c| project_comment(c, t.comment_likers(c.id), caller.role, self.censor.as_ref()))
                .collect())
        })
    }

    pub fn delete_comment(&self, session: Option<&Session>, comment: CommentId) -> ServiceResult<()> {
        self.command(|t| {
            let caller = authorize(session, Action::DeleteComment, &ResourceRef::Comment(comment), &*t)?;
            t.comment_mut(comment)?.soft_delete()?;
            tracing::info!(comment_id = %comment, by = %caller.user_id, "comment deleted");
            Ok(())
        })
    }

    pub fn like_comment(
        &self,
        session: Option<&Session>,
        comment: CommentId,
        body: &Map<String, Value>,
    ) -> ServiceResult<CommentLike> {
        self.command(|t| {
            let caller = authorize(session, Action::LikeComment, &ResourceRef::Comment(comment), &*t)?;
            let group = live_comment_group(t, comment)?;
            gate(t.settings(group)?, ContentAction::LikeComment)?;

            let like = CommentLike {
                user: caller.user_id,
                comment,
                like_or_dislike: parse_like_value(body)?,
                created_at: Utc::now(),
            };
            t.upsert_comment_like(like);
            Ok(like)
        })
    }

    pub fn flag_comment(
        &self,
        session: Option<&Session>,
        comment: CommentId,
        body: &Map<String, Value>,
    ) -> ServiceResult<Flag> {
        self.command(|t| {
            let caller = authorize(session, Action::FlagComment, &ResourceRef::Comment(comment), &*t)?;
            let group = live_comment_group(t, comment)?;
            gate(t.settings(group)?, ContentAction::FlagComment)?;

            let flag = Flag {
                user: caller.user_id,
                post: t.comment(comment)?.post,
                comment: Some(comment),
                status: parse_flag_status(body)?,
                created_at: Utc::now(),
            };
            t.upsert_flag(flag.clone());
            tracing::info!(comment_id = %comment, by = %caller.user_id, status = %flag.status, "comment flagged");
            Ok(flag)
        })
    }
}

/// A post that can still be reacted to.
fn live_post(t: &Tables, post: PostId) -> ServiceResult<&Post> {
    let row = t.post(post)?;
    if row.is_deleted {
        return Err(DomainError::not_found("post").into());
    }
    Ok(row)
}

fn live_comment_group(t: &Tables, comment: CommentId) -> ServiceResult<GroupId> {
    let row = t.comment(comment)?;
    if row.is_deleted {
        return Err(DomainError::not_found("comment").into());
    }
    Ok(live_post(t, row.post)?.group)
}
