use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use kidsbook_content::{
    Comment, CommentLike, Flag, Game, GameAnswer, GameScene, Post, PostLike, PostReactions, Share,
    Survey, SurveyAnswer,
};
use kidsbook_core::{
    CommentId, DomainError, DomainResult, GameId, GroupId, NotificationId, PostId, SceneId, SurveyId,
    UserId,
};
use kidsbook_groups::{Group, GroupSettings, Membership};
use kidsbook_identity::{GroupActivity, User};
use kidsbook_notifications::{Notification, NotificationDraft, UnseenCount};

use super::rows::{Journal, Row, RowChange, RowKey};

/// Every table of the store.
///
/// Unique indexes (username, email, group name, membership pair, like and
/// flag keys, one answer per survey/game) are enforced by the insert methods,
/// which fail with `Conflict`.
///
/// Mutations happen in place. Each one records the before-image of the rows
/// it touches, so a transaction can be rolled back or handed to a backend as
/// the set of rows it changed.
#[derive(Debug, Default)]
pub struct Tables {
    users: BTreeMap<UserId, User>,

    groups: BTreeMap<GroupId, Group>,
    group_settings: BTreeMap<GroupId, GroupSettings>,
    memberships: BTreeMap<(GroupId, UserId), Membership>,

    posts: BTreeMap<PostId, Post>,
    comments: BTreeMap<CommentId, Comment>,
    post_likes: BTreeMap<(UserId, PostId), PostLike>,
    comment_likes: BTreeMap<(UserId, CommentId), CommentLike>,
    shares: BTreeMap<u64, Share>,
    next_share: u64,
    flags: BTreeMap<(UserId, PostId, Option<CommentId>), Flag>,

    notifications: BTreeMap<NotificationId, Notification>,
    unseen: BTreeMap<UserId, UnseenCount>,

    surveys: BTreeMap<SurveyId, Survey>,
    survey_answers: BTreeMap<(UserId, SurveyId), SurveyAnswer>,

    games: BTreeMap<GameId, Game>,
    scenes: BTreeMap<SceneId, GameScene>,
    game_answers: BTreeMap<(UserId, GameId), GameAnswer>,

    journal: Journal,
}

// ─────────────────────────────────────────────────────────────────────────────
// Row access and the undo journal
// ─────────────────────────────────────────────────────────────────────────────

impl Tables {
    /// Rebuild tables from stored rows. Nothing is journaled.
    pub fn from_rows(rows: impl IntoIterator<Item = Row>) -> Self {
        let mut tables = Self::default();
        for row in rows {
            tables.store_row(row);
        }
        tables
    }

    /// Current value of one row.
    pub fn row(&self, key: RowKey) -> Option<Row> {
        match key {
            RowKey::User(id) => self.users.get(&id).cloned().map(Row::User),
            RowKey::Group(id) => self.groups.get(&id).cloned().map(Row::Group),
            RowKey::GroupSettings(id) => self.group_settings.get(&id).map(|s| Row::GroupSettings(id, *s)),
            RowKey::Membership(g, u) => self.memberships.get(&(g, u)).map(|m| Row::Membership(*m)),
            RowKey::Post(id) => self.posts.get(&id).cloned().map(Row::Post),
            RowKey::Comment(id) => self.comments.get(&id).cloned().map(Row::Comment),
            RowKey::PostLike(u, p) => self.post_likes.get(&(u, p)).map(|l| Row::PostLike(*l)),
            RowKey::CommentLike(u, c) => self.comment_likes.get(&(u, c)).map(|l| Row::CommentLike(*l)),
            RowKey::Share(seq) => self.shares.get(&seq).map(|s| Row::Share(seq, *s)),
            RowKey::Flag(u, p, c) => self.flags.get(&(u, p, c)).cloned().map(Row::Flag),
            RowKey::Notification(id) => self.notifications.get(&id).cloned().map(Row::Notification),
            RowKey::Unseen(u) => self.unseen.get(&u).map(|c| Row::Unseen(u, *c)),
            RowKey::Survey(id) => self.surveys.get(&id).cloned().map(Row::Survey),
            RowKey::SurveyAnswer(u, s) => self.survey_answers.get(&(u, s)).cloned().map(Row::SurveyAnswer),
            RowKey::Game(id) => self.games.get(&id).cloned().map(Row::Game),
            RowKey::Scene(id) => self.scenes.get(&id).cloned().map(Row::Scene),
            RowKey::GameAnswer(u, g) => self.game_answers.get(&(u, g)).cloned().map(Row::GameAnswer),
        }
    }

    fn store_row(&mut self, row: Row) {
        match row {
            Row::User(u) => {
                self.users.insert(u.id, u);
            }
            Row::Group(g) => {
                self.groups.insert(g.id, g);
            }
            Row::GroupSettings(g, s) => {
                self.group_settings.insert(g, s);
            }
            Row::Membership(m) => {
                self.memberships.insert((m.group, m.user), m);
            }
            Row::Post(p) => {
                self.posts.insert(p.id, p);
            }
            Row::Comment(c) => {
                self.comments.insert(c.id, c);
            }
            Row::PostLike(l) => {
                self.post_likes.insert((l.user, l.post), l);
            }
            Row::CommentLike(l) => {
                self.comment_likes.insert((l.user, l.comment), l);
            }
            Row::Share(seq, s) => {
                self.next_share = self.next_share.max(seq.saturating_add(1));
                self.shares.insert(seq, s);
            }
            Row::Flag(f) => {
                self.flags.insert(f.key(), f);
            }
            Row::Notification(n) => {
                self.notifications.insert(n.id, n);
            }
            Row::Unseen(u, c) => {
                self.unseen.insert(u, c);
            }
            Row::Survey(s) => {
                self.surveys.insert(s.id, s);
            }
            Row::SurveyAnswer(a) => {
                self.survey_answers.insert((a.user, a.survey), a);
            }
            Row::Game(g) => {
                self.games.insert(g.id, g);
            }
            Row::Scene(s) => {
                self.scenes.insert(s.id, s);
            }
            Row::GameAnswer(a) => {
                self.game_answers.insert((a.user, a.game), a);
            }
        }
    }

    fn drop_row(&mut self, key: RowKey) {
        match key {
            RowKey::User(id) => {
                self.users.remove(&id);
            }
            RowKey::Group(id) => {
                self.groups.remove(&id);
            }
            RowKey::GroupSettings(id) => {
                self.group_settings.remove(&id);
            }
            RowKey::Membership(g, u) => {
                self.memberships.remove(&(g, u));
            }
            RowKey::Post(id) => {
                self.posts.remove(&id);
            }
            RowKey::Comment(id) => {
                self.comments.remove(&id);
            }
            RowKey::PostLike(u, p) => {
                self.post_likes.remove(&(u, p));
            }
            RowKey::CommentLike(u, c) => {
                self.comment_likes.remove(&(u, c));
            }
            RowKey::Share(seq) => {
                self.shares.remove(&seq);
            }
            RowKey::Flag(u, p, c) => {
                self.flags.remove(&(u, p, c));
            }
            RowKey::Notification(id) => {
                self.notifications.remove(&id);
            }
            RowKey::Unseen(u) => {
                self.unseen.remove(&u);
            }
            RowKey::Survey(id) => {
                self.surveys.remove(&id);
            }
            RowKey::SurveyAnswer(u, s) => {
                self.survey_answers.remove(&(u, s));
            }
            RowKey::Game(id) => {
                self.games.remove(&id);
            }
            RowKey::Scene(id) => {
                self.scenes.remove(&id);
            }
            RowKey::GameAnswer(u, g) => {
                self.game_answers.remove(&(u, g));
            }
        }
    }

    /// Record the before-image of `key` the first time a transaction touches it.
    fn touch(&mut self, key: RowKey) {
        if !self.journal.is_recorded(&key) {
            let before = self.row(key);
            self.journal.record(key, before);
        }
    }

    fn put(&mut self, row: Row) {
        self.touch(row.key());
        self.store_row(row);
    }

    fn delete(&mut self, key: RowKey) {
        self.touch(key);
        self.drop_row(key);
    }

    /// Forget any journal left over from outside a transaction.
    pub(super) fn begin(&mut self) {
        self.journal = Journal::default();
    }

    /// Committed state of every row touched since `begin`, in first-touch
    /// order. Rows that ended where they started are left out.
    pub(super) fn pending_changes(&self) -> Vec<RowChange> {
        self.journal
            .entries()
            .iter()
            .filter_map(|(key, before)| match (before, self.row(*key)) {
                (None, None) => None,
                (None, Some(row)) => Some(RowChange::Insert(row)),
                (Some(_), None) => Some(RowChange::Delete(*key)),
                (Some(old), Some(row)) => (*old != row).then_some(RowChange::Update(row)),
            })
            .collect()
    }

    pub(super) fn commit(&mut self) {
        self.journal = Journal::default();
    }

    /// Restore every touched row to its before-image.
    pub(super) fn rollback(&mut self) {
        let journal = std::mem::take(&mut self.journal);
        for (key, before) in journal.into_entries().into_iter().rev() {
            match before {
                Some(row) => self.store_row(row),
                None => self.drop_row(key),
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

impl Tables {
    pub fn insert_user(&mut self, user: User) -> DomainResult<()> {
        self.ensure_profile_unique(user.id, Some(&user.username), Some(&user.email_address))?;
        self.put(Row::User(user));
        Ok(())
    }

    pub fn user(&self, id: UserId) -> DomainResult<&User> {
        self.users.get(&id).ok_or_else(|| DomainError::not_found("user"))
    }

    pub fn user_mut(&mut self, id: UserId) -> DomainResult<&mut User> {
        self.touch(RowKey::User(id));
        self.users.get_mut(&id).ok_or_else(|| DomainError::not_found("user"))
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn user_by_email(&self, email_address: &str) -> Option<&User> {
        self.users
            .values()
            .find(|u| u.email_address.eq_ignore_ascii_case(email_address.trim()))
    }

    /// Username and email must not belong to anybody but `owner`.
    pub fn ensure_profile_unique(
        &self,
        owner: UserId,
        username: Option<&str>,
        email_address: Option<&str>,
    ) -> DomainResult<()> {
        for other in self.users.values().filter(|u| u.id != owner) {
            if username.is_some_and(|n| other.username == n) {
                return Err(DomainError::conflict("A user with that username already exists."));
            }
            if email_address.is_some_and(|e| other.email_address.eq_ignore_ascii_case(e)) {
                return Err(DomainError::conflict("A user with that email address already exists."));
            }
        }
        Ok(())
    }

    pub fn virtual_students_of(&self, teacher: UserId) -> Vec<UserId> {
        self.users
            .values()
            .filter(|u| u.is_virtual_of(teacher))
            .map(|u| u.id)
            .collect()
    }

    /// Activity of `user` inside `group`, as shown on a profile.
    ///
    /// Likes given count positive likes on posts and on comments of the
    /// group; likes received count positive likes on the user's posts.
    pub fn group_activity(&self, user: UserId, group: GroupId) -> GroupActivity {
        let in_group = |post: PostId| self.posts.get(&post).is_some_and(|p| p.group == group);
        let comment_in_group = |comment: CommentId| self.comments.get(&comment).is_some_and(|c| in_group(c.post));

        let num_comments = self
            .comments
            .values()
            .filter(|c| c.creator == user && !c.is_deleted && in_group(c.post))
            .count();
        let post_likes_given = self
            .post_likes
            .values()
            .filter(|l| l.user == user && l.like_or_dislike && in_group(l.post))
            .count();
        let comment_likes_given = self
            .comment_likes
            .values()
            .filter(|l| l.user == user && l.like_or_dislike && comment_in_group(l.comment))
            .count();
        let num_likes_received = self
            .post_likes
            .values()
            .filter(|l| l.like_or_dislike)
            .filter(|l| self.posts.get(&l.post).is_some_and(|p| p.group == group && p.creator == user))
            .count();

        GroupActivity {
            num_comments,
            num_likes_given: post_likes_given + comment_likes_given,
            num_likes_received,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Groups, settings, memberships
// ─────────────────────────────────────────────────────────────────────────────

impl Tables {
    /// Insert a group together with its default settings row.
    pub fn insert_group(&mut self, group: Group) -> DomainResult<()> {
        self.ensure_group_name_free(&group.name, None)?;
        let id = group.id;
        self.put(Row::Group(group));
        self.put(Row::GroupSettings(id, GroupSettings::default()));
        Ok(())
    }

    pub fn ensure_group_name_free(&self, name: &str, except: Option<GroupId>) -> DomainResult<()> {
        if self.groups.values().any(|g| g.name == name && Some(g.id) != except) {
            return Err(DomainError::conflict("Group name already exists."));
        }
        Ok(())
    }

    pub fn group(&self, id: GroupId) -> DomainResult<&Group> {
        self.groups
            .get(&id)
            .ok_or_else(|| DomainError::not_found("Requested group doesn't exist."))
    }

    pub fn group_mut(&mut self, id: GroupId) -> DomainResult<&mut Group> {
        self.touch(RowKey::Group(id));
        self.groups
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("Requested group doesn't exist."))
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn settings(&self, group: GroupId) -> DomainResult<&GroupSettings> {
        self.group_settings
            .get(&group)
            .ok_or_else(|| DomainError::not_found("group settings"))
    }

    pub fn settings_mut(&mut self, group: GroupId) -> DomainResult<&mut GroupSettings> {
        self.touch(RowKey::GroupSettings(group));
        self.group_settings
            .get_mut(&group)
            .ok_or_else(|| DomainError::not_found("group settings"))
    }

    /// Delete a group and everything it owns.
    pub fn remove_group(&mut self, id: GroupId) -> DomainResult<Group> {
        let group = self.group(id)?.clone();

        let mut doomed = vec![RowKey::Group(id), RowKey::GroupSettings(id)];
        doomed.extend(self.memberships.keys().filter(|(g, _)| *g == id).map(|(g, u)| RowKey::Membership(*g, *u)));

        let posts: Vec<PostId> = self.posts.values().filter(|p| p.group == id).map(|p| p.id).collect();
        for post in posts {
            doomed.extend(self.post_rows(post));
        }

        for survey in self.surveys.values().filter(|s| s.group == id) {
            doomed.push(RowKey::Survey(survey.id));
            doomed.extend(
                self.survey_answers
                    .keys()
                    .filter(|(_, s)| *s == survey.id)
                    .map(|(u, s)| RowKey::SurveyAnswer(*u, *s)),
            );
        }

        for game in self.games.values().filter(|g| g.group == id) {
            doomed.push(RowKey::Game(game.id));
            doomed.extend(self.scenes.values().filter(|s| s.game == game.id).map(|s| RowKey::Scene(s.id)));
            doomed.extend(
                self.game_answers
                    .keys()
                    .filter(|(_, g)| *g == game.id)
                    .map(|(u, g)| RowKey::GameAnswer(*u, *g)),
            );
        }

        doomed.extend(
            self.notifications
                .values()
                .filter(|n| n.group == id)
                .map(|n| RowKey::Notification(n.id)),
        );

        for key in doomed {
            self.delete(key);
        }
        Ok(group)
    }

    /// Keys of a post and every row hanging off it.
    fn post_rows(&self, post: PostId) -> Vec<RowKey> {
        let mut keys = vec![RowKey::Post(post)];
        for comment in self.comments.values().filter(|c| c.post == post) {
            keys.push(RowKey::Comment(comment.id));
            keys.extend(
                self.comment_likes
                    .keys()
                    .filter(|(_, c)| *c == comment.id)
                    .map(|(u, c)| RowKey::CommentLike(*u, *c)),
            );
        }
        keys.extend(
            self.post_likes
                .keys()
                .filter(|(_, p)| *p == post)
                .map(|(u, p)| RowKey::PostLike(*u, *p)),
        );
        keys.extend(
            self.shares
                .iter()
                .filter(|(_, s)| s.post == post)
                .map(|(seq, _)| RowKey::Share(*seq)),
        );
        keys.extend(
            self.flags
                .keys()
                .filter(|(_, p, _)| *p == post)
                .map(|(u, p, c)| RowKey::Flag(*u, *p, *c)),
        );
        keys
    }

    pub fn is_member(&self, user: UserId, group: GroupId) -> bool {
        self.memberships.contains_key(&(group, user))
    }

    pub fn insert_membership(&mut self, user: UserId, group: GroupId, joined_at: DateTime<Utc>) -> DomainResult<()> {
        if self.is_member(user, group) {
            return Err(DomainError::conflict("User is already a member of this group."));
        }
        self.put(Row::Membership(Membership { user, group, joined_at }));
        Ok(())
    }

    pub fn remove_membership(&mut self, user: UserId, group: GroupId) -> DomainResult<()> {
        if !self.is_member(user, group) {
            return Err(DomainError::not_found("membership"));
        }
        self.delete(RowKey::Membership(group, user));
        Ok(())
    }

    /// Members in join order.
    pub fn members_of(&self, group: GroupId) -> Vec<UserId> {
        let mut rows: Vec<&Membership> = self.memberships.values().filter(|m| m.group == group).collect();
        rows.sort_by_key(|m| m.joined_at);
        rows.into_iter().map(|m| m.user).collect()
    }

    pub fn groups_of(&self, user: UserId) -> Vec<&Group> {
        self.memberships
            .values()
            .filter(|m| m.user == user)
            .filter_map(|m| self.groups.get(&m.group))
            .collect()
    }

    pub fn membership_count(&self, group: GroupId) -> usize {
        self.memberships.keys().filter(|(g, _)| *g == group).count()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Posts, comments, reactions
// ─────────────────────────────────────────────────────────────────────────────

impl Tables {
    pub fn insert_post(&mut self, post: Post) {
        self.put(Row::Post(post));
    }

    pub fn post(&self, id: PostId) -> DomainResult<&Post> {
        self.posts.get(&id).ok_or_else(|| DomainError::not_found("post"))
    }

    pub fn post_mut(&mut self, id: PostId) -> DomainResult<&mut Post> {
        self.touch(RowKey::Post(id));
        self.posts.get_mut(&id).ok_or_else(|| DomainError::not_found("post"))
    }

    /// Posts of a group, newest first.
    pub fn posts_in(&self, group: GroupId) -> Vec<&Post> {
        let mut posts: Vec<&Post> = self.posts.values().filter(|p| p.group == group).collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        posts
    }

    /// Live posts written by `user`, across every group, newest first.
    pub fn posts_by(&self, user: UserId) -> Vec<&Post> {
        let mut posts: Vec<&Post> = self
            .posts
            .values()
            .filter(|p| p.creator == user && !p.is_deleted)
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        posts
    }

    pub fn insert_comment(&mut self, comment: Comment) {
        self.put(Row::Comment(comment));
    }

    pub fn comment(&self, id: CommentId) -> DomainResult<&Comment> {
        self.comments.get(&id).ok_or_else(|| DomainError::not_found("comment"))
    }

    pub fn comment_mut(&mut self, id: CommentId) -> DomainResult<&mut Comment> {
        self.touch(RowKey::Comment(id));
        self.comments.get_mut(&id).ok_or_else(|| DomainError::not_found("comment"))
    }

    /// Comments on a post, oldest first.
    pub fn comments_on(&self, post: PostId) -> Vec<&Comment> {
        let mut comments: Vec<&Comment> = self.comments.values().filter(|c| c.post == post).collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        comments
    }

    /// Upsert by (user, post). Returns the previous row, if any.
    pub fn upsert_post_like(&mut self, like: PostLike) -> Option<PostLike> {
        let previous = self.post_likes.get(&(like.user, like.post)).copied();
        self.put(Row::PostLike(like));
        previous
    }

    /// Upsert by (user, comment). Returns the previous row, if any.
    pub fn upsert_comment_like(&mut self, like: CommentLike) -> Option<CommentLike> {
        let previous = self.comment_likes.get(&(like.user, like.comment)).copied();
        self.put(Row::CommentLike(like));
        previous
    }

    pub fn insert_share(&mut self, share: Share) {
        let seq = self.next_share;
        self.put(Row::Share(seq, share));
    }

    /// Upsert by (user, post, comment).
    pub fn upsert_flag(&mut self, flag: Flag) -> Option<Flag> {
        let previous = self.flags.get(&flag.key()).cloned();
        self.put(Row::Flag(flag));
        previous
    }

    pub fn post_likes(&self, post: PostId) -> impl Iterator<Item = &PostLike> {
        self.post_likes.values().filter(move |l| l.post == post)
    }

    pub fn comment_likes(&self, comment: CommentId) -> impl Iterator<Item = &CommentLike> {
        self.comment_likes.values().filter(move |l| l.comment == comment)
    }

    pub fn shares_of(&self, post: PostId) -> impl Iterator<Item = &Share> {
        self.shares.values().filter(move |s| s.post == post)
    }

    pub fn flags_on(&self, post: PostId, comment: Option<CommentId>) -> impl Iterator<Item = &Flag> {
        self.flags
            .values()
            .filter(move |f| f.post == post && f.comment == comment)
    }

    pub fn post_reactions(&self, post: PostId) -> PostReactions {
        PostReactions {
            likes: self
                .post_likes(post)
                .filter(|l| l.like_or_dislike)
                .map(|l| l.user)
                .collect(),
            shares: self.shares_of(post).map(|s| s.user).collect(),
            flags: self.flags_on(post, None).map(|f| f.user).collect(),
            num_comments: self.comments_on(post).iter().filter(|c| !c.is_deleted).count(),
        }
    }

    /// Users with a positive like on `comment`.
    pub fn comment_likers(&self, comment: CommentId) -> Vec<UserId> {
        self.comment_likes(comment)
            .filter(|l| l.like_or_dislike)
            .map(|l| l.user)
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Notifications
// ─────────────────────────────────────────────────────────────────────────────

impl Tables {
    /// Persist a notification and bump its recipient's unseen counter.
    pub fn notify(&mut self, draft: NotificationDraft, now: DateTime<Utc>) -> Notification {
        let notification = draft.stamp(now);
        let mut unseen = self.unseen(notification.user);
        unseen.bump();
        self.put(Row::Unseen(notification.user, unseen));
        self.put(Row::Notification(notification.clone()));
        notification
    }

    /// Notifications of `user`, newest first.
    pub fn notifications_for(&self, user: UserId) -> Vec<&Notification> {
        self.notifications.values().rev().filter(|n| n.user == user).collect()
    }

    pub fn unseen(&self, user: UserId) -> UnseenCount {
        self.unseen.get(&user).copied().unwrap_or_default()
    }

    pub fn reset_unseen(&mut self, user: UserId) {
        let mut unseen = self.unseen(user);
        unseen.reset();
        self.put(Row::Unseen(user, unseen));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Surveys and games
// ─────────────────────────────────────────────────────────────────────────────

impl Tables {
    pub fn insert_survey(&mut self, survey: Survey) {
        self.put(Row::Survey(survey));
    }

    pub fn survey(&self, id: SurveyId) -> DomainResult<&Survey> {
        self.surveys.get(&id).ok_or_else(|| DomainError::not_found("survey"))
    }

    pub fn survey_mut(&mut self, id: SurveyId) -> DomainResult<&mut Survey> {
        self.touch(RowKey::Survey(id));
        self.surveys.get_mut(&id).ok_or_else(|| DomainError::not_found("survey"))
    }

    pub fn surveys_in(&self, group: GroupId) -> Vec<&Survey> {
        self.surveys.values().filter(|s| s.group == group).collect()
    }

    pub fn has_answered_survey(&self, user: UserId, survey: SurveyId) -> bool {
        self.survey_answers.contains_key(&(user, survey))
    }

    pub fn insert_survey_answer(&mut self, answer: SurveyAnswer) -> DomainResult<()> {
        if self.has_answered_survey(answer.user, answer.survey) {
            return Err(DomainError::conflict("You have already answered this survey."));
        }
        self.put(Row::SurveyAnswer(answer));
        Ok(())
    }

    pub fn insert_game(&mut self, game: Game, scenes: Vec<GameScene>) {
        self.put(Row::Game(game));
        for scene in scenes {
            self.put(Row::Scene(scene));
        }
    }

    pub fn game(&self, id: GameId) -> DomainResult<&Game> {
        self.games.get(&id).ok_or_else(|| DomainError::not_found("game"))
    }

    pub fn game_mut(&mut self, id: GameId) -> DomainResult<&mut Game> {
        self.touch(RowKey::Game(id));
        self.games.get_mut(&id).ok_or_else(|| DomainError::not_found("game"))
    }

    pub fn games_in(&self, group: GroupId) -> Vec<&Game> {
        self.games.values().filter(|g| g.group == group).collect()
    }

    pub fn scenes_of(&self, game: GameId) -> BTreeMap<SceneId, GameScene> {
        self.scenes
            .values()
            .filter(|s| s.game == game)
            .map(|s| (s.id, s.clone()))
            .collect()
    }

    pub fn has_answered_game(&self, user: UserId, game: GameId) -> bool {
        self.game_answers.contains_key(&(user, game))
    }

    pub fn insert_game_answer(&mut self, answer: GameAnswer) -> DomainResult<()> {
        if self.has_answered_game(answer.user, answer.game) {
            return Err(DomainError::conflict("You have already answered this game."));
        }
        self.put(Row::GameAnswer(answer));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kidsbook_auth::Identity;
    use kidsbook_content::{CreateComment, CreatePost};
    use kidsbook_groups::CreateGroup;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn post_in(t: &mut Tables, group: GroupId, creator: UserId, content: &str) -> PostId {
        let post = Post::create(
            CreatePost {
                content: content.into(),
                picture: None,
                link: None,
                ogp: None,
                is_sponsored: false,
                is_announcement: false,
            },
            group,
            creator,
            test_time(),
        )
        .unwrap();
        let id = post.id;
        t.insert_post(post);
        id
    }

    fn seeded() -> (Tables, User, Group) {
        let mut t = Tables::default();
        let teacher = User::teacher("alice", "alice@school.org", test_time()).unwrap();
        t.insert_user(teacher.clone()).unwrap();
        let group = Group::create(
            CreateGroup {
                group_id: GroupId::new(),
                name: "Math".into(),
                description: None,
                picture: None,
                occurred_at: test_time(),
            },
            &Identity::new(teacher.id, teacher.role),
        )
        .unwrap();
        t.insert_group(group.clone()).unwrap();
        t.insert_membership(teacher.id, group.id, test_time()).unwrap();
        (t, teacher, group)
    }

    #[test]
    fn usernames_and_emails_are_unique() {
        let (mut t, _, _) = seeded();
        let dup_name = User::teacher("alice", "other@school.org", test_time()).unwrap();
        assert!(matches!(t.insert_user(dup_name), Err(DomainError::Conflict(_))));
        let dup_mail = User::teacher("bob", "ALICE@school.org", test_time()).unwrap();
        assert!(matches!(t.insert_user(dup_mail), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn group_names_are_unique_and_case_sensitive() {
        let (t, _, group) = seeded();
        assert!(t.ensure_group_name_free("Math", None).is_err());
        assert!(t.ensure_group_name_free("Math", Some(group.id)).is_ok());
        assert!(t.ensure_group_name_free("math", None).is_ok());
    }

    #[test]
    fn removing_a_group_cascades() {
        let (mut t, teacher, group) = seeded();
        let post = Post::create(
            CreatePost {
                content: "hello".into(),
                picture: None,
                link: None,
                ogp: None,
                is_sponsored: false,
                is_announcement: false,
            },
            group.id,
            teacher.id,
            test_time(),
        )
        .unwrap();
        let post_id = post.id;
        t.insert_post(post);
        t.upsert_post_like(PostLike {
            user: teacher.id,
            post: post_id,
            like_or_dislike: true,
            created_at: test_time(),
        });

        t.remove_group(group.id).unwrap();
        assert!(t.post(post_id).is_err());
        assert_eq!(t.post_likes(post_id).count(), 0);
        assert!(!t.is_member(teacher.id, group.id));
        assert!(t.settings(group.id).is_err());
    }

    #[test]
    fn notify_bumps_the_unseen_counter() {
        let (mut t, teacher, group) = seeded();
        t.notify(NotificationDraft::added_to_group(teacher.id, group.id, &group.name), test_time());
        t.notify(NotificationDraft::removed_from_group(teacher.id, group.id, &group.name), test_time());
        assert_eq!(t.unseen(teacher.id).number_of_unseen, 2);
        assert_eq!(t.notifications_for(teacher.id).len(), 2);

        t.reset_unseen(teacher.id);
        assert_eq!(t.unseen(teacher.id).number_of_unseen, 0);
        assert_eq!(t.notifications_for(teacher.id).len(), 2);
    }

    #[test]
    fn rollback_restores_every_touched_row() {
        let (mut t, teacher, group) = seeded();
        t.begin();
        t.group_mut(group.id).unwrap().name = "Renamed".into();
        t.settings_mut(group.id).unwrap().is_like_enabled = false;
        let post = post_in(&mut t, group.id, teacher.id, "draft");
        t.remove_membership(teacher.id, group.id).unwrap();

        t.rollback();
        assert_eq!(t.group(group.id).unwrap().name, "Math");
        assert!(t.settings(group.id).unwrap().is_like_enabled);
        assert!(t.post(post).is_err());
        assert!(t.is_member(teacher.id, group.id));
        assert!(t.pending_changes().is_empty());
    }

    #[test]
    fn pending_changes_hold_only_rows_that_differ() {
        let (mut t, teacher, group) = seeded();
        t.begin();
        let _ = t.user_mut(teacher.id).unwrap();
        // The counter row is new, so it counts even though it reads zero.
        t.reset_unseen(teacher.id);
        t.reset_unseen(teacher.id);
        let post = post_in(&mut t, group.id, teacher.id, "hello");

        let changes = t.pending_changes();
        let keys: Vec<RowKey> = changes.iter().map(RowChange::key).collect();
        assert_eq!(keys, vec![RowKey::Unseen(teacher.id), RowKey::Post(post)]);
        assert!(changes.iter().all(|c| matches!(c, RowChange::Insert(_))));

        t.commit();
        assert!(t.pending_changes().is_empty());
        t.begin();
        t.remove_group(group.id).unwrap();
        let deleted = t.pending_changes();
        assert!(deleted.iter().all(|c| matches!(c, RowChange::Delete(_))));
        assert!(deleted.contains(&RowChange::Delete(RowKey::Post(post))));
        assert!(deleted.contains(&RowChange::Delete(RowKey::Membership(group.id, teacher.id))));

        t.commit();
        t.begin();
        t.reset_unseen(teacher.id);
        t.notify(NotificationDraft::added_to_group(teacher.id, group.id, "Math"), test_time());
        assert!(matches!(t.pending_changes()[0], RowChange::Update(Row::Unseen(_, c)) if c.number_of_unseen == 1));
    }

    #[test]
    fn rebuilding_from_rows_keeps_share_order() {
        let (mut t, teacher, group) = seeded();
        let post = post_in(&mut t, group.id, teacher.id, "hello");
        for _ in 0..3 {
            t.insert_share(Share {
                user: teacher.id,
                post,
                created_at: test_time(),
            });
        }
        let rows: Vec<Row> = (0..3).filter_map(|seq| t.row(RowKey::Share(seq))).collect();
        assert_eq!(rows.len(), 3);

        let mut rebuilt = Tables::from_rows(rows);
        rebuilt.insert_share(Share {
            user: teacher.id,
            post,
            created_at: test_time(),
        });
        assert_eq!(rebuilt.shares_of(post).count(), 4);
        assert!(rebuilt.row(RowKey::Share(3)).is_some());
    }

    #[test]
    fn likes_given_include_comment_likes() {
        let (mut t, teacher, group) = seeded();
        let kid = UserId::new();
        let post = post_in(&mut t, group.id, kid, "testing content");
        for user in [teacher.id, kid] {
            t.upsert_post_like(PostLike {
                user,
                post,
                like_or_dislike: true,
                created_at: test_time(),
            });
        }
        let teacher_comment = Comment::create(
            CreateComment {
                content: "testing comment".into(),
            },
            post,
            teacher.id,
            test_time(),
        )
        .unwrap();
        let kid_comment = Comment::create(
            CreateComment {
                content: "another comment".into(),
            },
            post,
            kid,
            test_time(),
        )
        .unwrap();
        let liked = teacher_comment.id;
        t.insert_comment(teacher_comment);
        t.insert_comment(kid_comment);
        t.upsert_comment_like(CommentLike {
            user: kid,
            comment: liked,
            like_or_dislike: true,
            created_at: test_time(),
        });

        let stats = t.group_activity(kid, group.id);
        assert_eq!(stats.num_comments, 1);
        assert_eq!(stats.num_likes_given, 2);
        assert_eq!(stats.num_likes_received, 2);

        // A dislike stops counting.
        t.upsert_comment_like(CommentLike {
            user: kid,
            comment: liked,
            like_or_dislike: false,
            created_at: test_time(),
        });
        assert_eq!(t.group_activity(kid, group.id).num_likes_given, 1);
    }

    #[test]
    fn posts_by_skips_deleted_posts_and_other_authors() {
        let (mut t, teacher, group) = seeded();
        let kid = UserId::new();
        let gone = post_in(&mut t, group.id, kid, "old");
        let kept = post_in(&mut t, group.id, kid, "This is new");
        post_in(&mut t, group.id, teacher.id, "not mine");
        t.post_mut(gone).unwrap().soft_delete().unwrap();

        let mine: Vec<PostId> = t.posts_by(kid).iter().map(|p| p.id).collect();
        assert_eq!(mine, vec![kept]);
    }
}
