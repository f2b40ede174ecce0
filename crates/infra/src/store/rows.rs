//! Row-level view of the tables: primary keys, row values and the undo
//! journal a transaction keeps while it mutates in place.

use std::collections::BTreeSet;

use kidsbook_content::{Comment, CommentLike, Flag, Game, GameAnswer, GameScene, Post, PostLike, Share, Survey, SurveyAnswer};
use kidsbook_core::{CommentId, GameId, GroupId, NotificationId, PostId, SceneId, SurveyId, UserId};
use kidsbook_groups::{Group, GroupSettings, Membership};
use kidsbook_identity::User;
use kidsbook_notifications::{Notification, UnseenCount};

/// Primary key of one row, across every table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RowKey {
    User(UserId),
    Group(GroupId),
    GroupSettings(GroupId),
    Membership(GroupId, UserId),
    Post(PostId),
    Comment(CommentId),
    PostLike(UserId, PostId),
    CommentLike(UserId, CommentId),
    Share(u64),
    Flag(UserId, PostId, Option<CommentId>),
    Notification(NotificationId),
    Unseen(UserId),
    Survey(SurveyId),
    SurveyAnswer(UserId, SurveyId),
    Game(GameId),
    Scene(SceneId),
    GameAnswer(UserId, GameId),
}

/// One stored row. Rows without an id of their own carry their key.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    User(User),
    Group(Group),
    GroupSettings(GroupId, GroupSettings),
    Membership(Membership),
    Post(Post),
    Comment(Comment),
    PostLike(PostLike),
    CommentLike(CommentLike),
    Share(u64, Share),
    Flag(Flag),
    Notification(Notification),
    Unseen(UserId, UnseenCount),
    Survey(Survey),
    SurveyAnswer(SurveyAnswer),
    Game(Game),
    Scene(GameScene),
    GameAnswer(GameAnswer),
}

impl Row {
    pub fn key(&self) -> RowKey {
        match self {
            Row::User(u) => RowKey::User(u.id),
            Row::Group(g) => RowKey::Group(g.id),
            Row::GroupSettings(g, _) => RowKey::GroupSettings(*g),
            Row::Membership(m) => RowKey::Membership(m.group, m.user),
            Row::Post(p) => RowKey::Post(p.id),
            Row::Comment(c) => RowKey::Comment(c.id),
            Row::PostLike(l) => RowKey::PostLike(l.user, l.post),
            Row::CommentLike(l) => RowKey::CommentLike(l.user, l.comment),
            Row::Share(seq, _) => RowKey::Share(*seq),
            Row::Flag(f) => {
                let (user, post, comment) = f.key();
                RowKey::Flag(user, post, comment)
            }
            Row::Notification(n) => RowKey::Notification(n.id),
            Row::Unseen(u, _) => RowKey::Unseen(*u),
            Row::Survey(s) => RowKey::Survey(s.id),
            Row::SurveyAnswer(a) => RowKey::SurveyAnswer(a.user, a.survey),
            Row::Game(g) => RowKey::Game(g.id),
            Row::Scene(s) => RowKey::Scene(s.id),
            Row::GameAnswer(a) => RowKey::GameAnswer(a.user, a.game),
        }
    }
}

/// What a transaction did to one row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowChange {
    Insert(Row),
    Update(Row),
    Delete(RowKey),
}

impl RowChange {
    pub fn key(&self) -> RowKey {
        match self {
            RowChange::Insert(row) | RowChange::Update(row) => row.key(),
            RowChange::Delete(key) => *key,
        }
    }
}

/// Before-images of every key a transaction touched, in first-touch order.
#[derive(Debug, Clone, Default)]
pub(super) struct Journal {
    seen: BTreeSet<RowKey>,
    before: Vec<(RowKey, Option<Row>)>,
}

impl Journal {
    pub(super) fn is_recorded(&self, key: &RowKey) -> bool {
        self.seen.contains(key)
    }

    pub(super) fn record(&mut self, key: RowKey, before: Option<Row>) {
        if self.seen.insert(key) {
            self.before.push((key, before));
        }
    }

    pub(super) fn entries(&self) -> &[(RowKey, Option<Row>)] {
        &self.before
    }

    pub(super) fn into_entries(self) -> Vec<(RowKey, Option<Row>)> {
        self.before
    }
}
