//! Postgres-backed store backend.
//!
//! ## Layout
//!
//! One table per row kind (see `schema.sql`). Key and unique columns are real
//! columns; the row itself is stored as JSONB in `body`.
//!
//! ## Error Mapping
//!
//! | SQLx error | PostgreSQL code | StoreError |
//! |------------|-----------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` (message chosen by constraint name) |
//! | Database (other) | any other | `Backend` |
//! | anything else | N/A | `Backend` |
//!
//! ## Runtime
//!
//! [`StoreBackend`] is synchronous while sqlx is async. Calls are bridged with
//! `block_in_place` on the current tokio runtime, which must be the
//! multi-threaded flavour.

use std::future::Future;

use serde::Serialize;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row as _};
use tokio::runtime::{Handle, RuntimeFlavor};
use uuid::Uuid;

use kidsbook_core::{GroupId, UserId};

use super::{Row, RowChange, RowKey, StoreBackend, StoreError};

const SCHEMA: &str = include_str!("schema.sql");

/// Postgres-backed store backend.
///
/// Each change set runs in one SQL transaction: inserts are plain `INSERT`s,
/// so a key or unique column another writer already holds fails the whole set.
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and create any missing tables.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let backend = Self::new(pool);
        backend.ensure_schema().await?;
        Ok(backend)
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn fetch_tables(&self) -> Result<Vec<(Table, Vec<PgRow>)>, StoreError> {
        let mut fetched = Vec::with_capacity(Table::ALL.len());
        for table in Table::ALL {
            let sql = format!("SELECT * FROM {}", table.name());
            let rows = sqlx::query(&sql)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("load", e))?;
            fetched.push((table, rows));
        }
        Ok(fetched)
    }

    async fn execute(&self, statements: Vec<Statement>) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for Statement { sql, binds } in statements {
            let mut query = sqlx::query(&sql);
            for bind in binds {
                query = bind.apply(query);
            }
            query
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("write_row", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    fn block_on<T>(&self, operation: &'static str, fut: impl Future<Output = Result<T, StoreError>>) -> Result<T, StoreError> {
        let handle = Handle::try_current()
            .map_err(|_| StoreError::backend(operation, "postgres backend requires a tokio runtime"))?;
        if handle.runtime_flavor() == RuntimeFlavor::CurrentThread {
            return Err(StoreError::backend(
                operation,
                "postgres backend requires the multi-threaded tokio runtime",
            ));
        }
        tokio::task::block_in_place(|| handle.block_on(fut))
    }
}

impl StoreBackend for PostgresBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn load(&self) -> Result<Vec<Row>, StoreError> {
        let fetched = self.block_on("load", self.fetch_tables())?;
        let mut rows = Vec::new();
        for (table, pg_rows) in fetched {
            for pg_row in &pg_rows {
                rows.push(decode(table, pg_row)?);
            }
        }
        Ok(rows)
    }

    fn persist(&self, changes: &[RowChange]) -> Result<(), StoreError> {
        let statements = changes.iter().map(statement_for).collect::<Result<Vec<_>, _>>()?;
        let count = statements.len();
        self.block_on("persist", self.execute(statements))?;
        tracing::trace!(rows = count, "change set persisted");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Table mapping
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    Users,
    Groups,
    GroupSettings,
    Memberships,
    Posts,
    Comments,
    PostLikes,
    CommentLikes,
    Shares,
    Flags,
    Notifications,
    UnseenCounts,
    Surveys,
    SurveyAnswers,
    Games,
    GameScenes,
    GameAnswers,
}

impl Table {
    const ALL: [Table; 17] = [
        Table::Users,
        Table::Groups,
        Table::GroupSettings,
        Table::Memberships,
        Table::Posts,
        Table::Comments,
        Table::PostLikes,
        Table::CommentLikes,
        Table::Shares,
        Table::Flags,
        Table::Notifications,
        Table::UnseenCounts,
        Table::Surveys,
        Table::SurveyAnswers,
        Table::Games,
        Table::GameScenes,
        Table::GameAnswers,
    ];

    fn name(self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Groups => "groups",
            Table::GroupSettings => "group_settings",
            Table::Memberships => "memberships",
            Table::Posts => "posts",
            Table::Comments => "comments",
            Table::PostLikes => "post_likes",
            Table::CommentLikes => "comment_likes",
            Table::Shares => "shares",
            Table::Flags => "flags",
            Table::Notifications => "notifications",
            Table::UnseenCounts => "unseen_counts",
            Table::Surveys => "surveys",
            Table::SurveyAnswers => "survey_answers",
            Table::Games => "games",
            Table::GameScenes => "game_scenes",
            Table::GameAnswers => "game_answers",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Bind {
    Uuid(Uuid),
    Int(i64),
    Text(String),
    Json(Value),
}

impl Bind {
    fn apply<'q>(self, query: Query<'q, Postgres, PgArguments>) -> Query<'q, Postgres, PgArguments> {
        match self {
            Bind::Uuid(v) => query.bind(v),
            Bind::Int(v) => query.bind(v),
            Bind::Text(v) => query.bind(v),
            Bind::Json(v) => query.bind(v),
        }
    }
}

fn id(uuid: impl Into<Uuid>) -> Bind {
    Bind::Uuid(uuid.into())
}

/// Table and primary-key columns of `key`, in key order.
fn locate(key: &RowKey) -> Result<(Table, Vec<(&'static str, Bind)>), StoreError> {
    Ok(match *key {
        RowKey::User(u) => (Table::Users, vec![("id", id(u))]),
        RowKey::Group(g) => (Table::Groups, vec![("id", id(g))]),
        RowKey::GroupSettings(g) => (Table::GroupSettings, vec![("group_id", id(g))]),
        RowKey::Membership(g, u) => (Table::Memberships, vec![("group_id", id(g)), ("user_id", id(u))]),
        RowKey::Post(p) => (Table::Posts, vec![("id", id(p))]),
        RowKey::Comment(c) => (Table::Comments, vec![("id", id(c))]),
        RowKey::PostLike(u, p) => (Table::PostLikes, vec![("user_id", id(u)), ("post_id", id(p))]),
        RowKey::CommentLike(u, c) => (Table::CommentLikes, vec![("user_id", id(u)), ("comment_id", id(c))]),
        RowKey::Share(seq) => {
            let seq = i64::try_from(seq).map_err(|_| StoreError::backend("encode", "share sequence out of range"))?;
            (Table::Shares, vec![("seq", Bind::Int(seq))])
        }
        RowKey::Flag(u, p, c) => (
            Table::Flags,
            vec![
                ("user_id", id(u)),
                ("post_id", id(p)),
                ("comment_id", Bind::Uuid(c.map_or(Uuid::nil(), Uuid::from))),
            ],
        ),
        RowKey::Notification(n) => (Table::Notifications, vec![("id", id(n))]),
        RowKey::Unseen(u) => (Table::UnseenCounts, vec![("user_id", id(u))]),
        RowKey::Survey(s) => (Table::Surveys, vec![("id", id(s))]),
        RowKey::SurveyAnswer(u, s) => (Table::SurveyAnswers, vec![("user_id", id(u)), ("survey_id", id(s))]),
        RowKey::Game(g) => (Table::Games, vec![("id", id(g))]),
        RowKey::Scene(s) => (Table::GameScenes, vec![("id", id(s))]),
        RowKey::GameAnswer(u, g) => (Table::GameAnswers, vec![("user_id", id(u)), ("game_id", id(g))]),
    })
}

/// Non-key columns (besides `body`) a row keeps in the clear.
fn indexed_columns(row: &Row) -> Vec<(&'static str, Bind)> {
    match row {
        Row::User(u) => vec![
            ("username", Bind::Text(u.username.clone())),
            ("email_address", Bind::Text(u.email_address.clone())),
        ],
        Row::Group(g) => vec![("name", Bind::Text(g.name.clone()))],
        Row::Post(p) => vec![("group_id", id(p.group))],
        Row::Comment(c) => vec![("post_id", id(c.post))],
        Row::Share(_, s) => vec![("post_id", id(s.post))],
        Row::Notification(n) => vec![("user_id", id(n.user)), ("group_id", id(n.group))],
        Row::Survey(s) => vec![("group_id", id(s.group))],
        Row::Game(g) => vec![("group_id", id(g.group))],
        Row::Scene(s) => vec![("game_id", id(s.game))],
        Row::GroupSettings(..)
        | Row::Membership(_)
        | Row::PostLike(_)
        | Row::CommentLike(_)
        | Row::Flag(_)
        | Row::Unseen(..)
        | Row::SurveyAnswer(_)
        | Row::GameAnswer(_) => Vec::new(),
    }
}

fn body(row: &Row) -> Result<Value, StoreError> {
    fn json(value: &impl Serialize) -> Result<Value, StoreError> {
        serde_json::to_value(value).map_err(|e| StoreError::backend("encode", e.to_string()))
    }
    match row {
        Row::User(v) => json(v),
        Row::Group(v) => json(v),
        Row::GroupSettings(_, v) => json(v),
        Row::Membership(v) => json(v),
        Row::Post(v) => json(v),
        Row::Comment(v) => json(v),
        Row::PostLike(v) => json(v),
        Row::CommentLike(v) => json(v),
        Row::Share(_, v) => json(v),
        Row::Flag(v) => json(v),
        Row::Notification(v) => json(v),
        Row::Unseen(_, v) => json(v),
        Row::Survey(v) => json(v),
        Row::SurveyAnswer(v) => json(v),
        Row::Game(v) => json(v),
        Row::Scene(v) => json(v),
        Row::GameAnswer(v) => json(v),
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Statement {
    sql: String,
    binds: Vec<Bind>,
}

fn placeholders(from: usize, count: usize) -> Vec<String> {
    (from..from + count).map(|i| format!("${i}")).collect()
}

fn statement_for(change: &RowChange) -> Result<Statement, StoreError> {
    let (table, keys) = locate(&change.key())?;
    let (key_names, key_binds): (Vec<&str>, Vec<Bind>) = keys.into_iter().unzip();

    match change {
        RowChange::Insert(row) => {
            let (extra_names, extra_binds): (Vec<&str>, Vec<Bind>) = indexed_columns(row).into_iter().unzip();
            let columns: Vec<&str> = key_names.iter().chain(&extra_names).copied().chain(["body"]).collect();
            let mut binds = key_binds;
            binds.extend(extra_binds);
            binds.push(Bind::Json(body(row)?));
            Ok(Statement {
                sql: format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    table.name(),
                    columns.join(", "),
                    placeholders(1, columns.len()).join(", "),
                ),
                binds,
            })
        }
        RowChange::Update(row) => {
            let (extra_names, extra_binds): (Vec<&str>, Vec<Bind>) = indexed_columns(row).into_iter().unzip();
            let set_names: Vec<&str> = extra_names.into_iter().chain(["body"]).collect();
            let assignments: Vec<String> = set_names
                .iter()
                .zip(placeholders(1, set_names.len()))
                .map(|(c, p)| format!("{c} = {p}"))
                .collect();
            let conditions: Vec<String> = key_names
                .iter()
                .zip(placeholders(set_names.len() + 1, key_names.len()))
                .map(|(c, p)| format!("{c} = {p}"))
                .collect();
            let mut binds = extra_binds;
            binds.push(Bind::Json(body(row)?));
            binds.extend(key_binds);
            Ok(Statement {
                sql: format!(
                    "UPDATE {} SET {} WHERE {}",
                    table.name(),
                    assignments.join(", "),
                    conditions.join(" AND "),
                ),
                binds,
            })
        }
        RowChange::Delete(_) => {
            let conditions: Vec<String> = key_names
                .iter()
                .zip(placeholders(1, key_names.len()))
                .map(|(c, p)| format!("{c} = {p}"))
                .collect();
            Ok(Statement {
                sql: format!("DELETE FROM {} WHERE {}", table.name(), conditions.join(" AND ")),
                binds: key_binds,
            })
        }
    }
}

fn decode(table: Table, row: &PgRow) -> Result<Row, StoreError> {
    fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, StoreError>
    where
        T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
    {
        row.try_get(name).map_err(|e| map_sqlx_error("decode", e))
    }

    let body: Value = column(row, "body")?;
    let parse = |e: serde_json::Error| StoreError::backend("decode", format!("{}: {e}", table.name()));

    Ok(match table {
        Table::Users => Row::User(serde_json::from_value(body).map_err(parse)?),
        Table::Groups => Row::Group(serde_json::from_value(body).map_err(parse)?),
        Table::GroupSettings => Row::GroupSettings(
            GroupId::from_uuid(column(row, "group_id")?),
            serde_json::from_value(body).map_err(parse)?,
        ),
        Table::Memberships => Row::Membership(serde_json::from_value(body).map_err(parse)?),
        Table::Posts => Row::Post(serde_json::from_value(body).map_err(parse)?),
        Table::Comments => Row::Comment(serde_json::from_value(body).map_err(parse)?),
        Table::PostLikes => Row::PostLike(serde_json::from_value(body).map_err(parse)?),
        Table::CommentLikes => Row::CommentLike(serde_json::from_value(body).map_err(parse)?),
        Table::Shares => {
            let seq: i64 = column(row, "seq")?;
            let seq = u64::try_from(seq).map_err(|_| StoreError::backend("decode", "negative share sequence"))?;
            Row::Share(seq, serde_json::from_value(body).map_err(parse)?)
        }
        Table::Flags => Row::Flag(serde_json::from_value(body).map_err(parse)?),
        Table::Notifications => Row::Notification(serde_json::from_value(body).map_err(parse)?),
        Table::UnseenCounts => Row::Unseen(
            UserId::from_uuid(column(row, "user_id")?),
            serde_json::from_value(body).map_err(parse)?,
        ),
        Table::Surveys => Row::Survey(serde_json::from_value(body).map_err(parse)?),
        Table::SurveyAnswers => Row::SurveyAnswer(serde_json::from_value(body).map_err(parse)?),
        Table::Games => Row::Game(serde_json::from_value(body).map_err(parse)?),
        Table::GameScenes => Row::Scene(serde_json::from_value(body).map_err(parse)?),
        Table::GameAnswers => Row::GameAnswer(serde_json::from_value(body).map_err(parse)?),
    })
}

/// Message for a unique violation, by constraint name.
fn conflict_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("users_username_key") => "A user with that username already exists.",
        Some("users_email_address_key") => "A user with that email address already exists.",
        Some("groups_name_key") => "Group name already exists.",
        Some("memberships_pkey") => "User is already a member of this group.",
        Some("survey_answers_pkey") => "You have already answered this survey.",
        Some("game_answers_pkey") => "You have already answered this game.",
        _ => "A row with that key already exists.",
    }
}

fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                StoreError::Conflict(conflict_message(db_err.constraint()).to_string())
            } else {
                StoreError::backend(operation, db_err.message())
            }
        }
        sqlx::Error::PoolClosed => StoreError::backend(operation, "connection pool closed"),
        other => StoreError::backend(operation, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kidsbook_content::{Flag, PostLike};
    use kidsbook_core::{CommentId, PostId};
    use kidsbook_groups::Membership;
    use kidsbook_identity::User;

    #[test]
    fn inserts_list_keys_then_indexed_columns_then_body() {
        let user = User::teacher("alice", "alice@school.org", Utc::now()).unwrap();
        let stmt = statement_for(&RowChange::Insert(Row::User(user.clone()))).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO users (id, username, email_address, body) VALUES ($1, $2, $3, $4)"
        );
        assert_eq!(stmt.binds[0], Bind::Uuid(*user.id.as_uuid()));
        assert_eq!(stmt.binds[1], Bind::Text("alice".into()));
        assert!(matches!(&stmt.binds[3], Bind::Json(v) if v["username"] == "alice"));
    }

    #[test]
    fn updates_bind_assignments_before_keys() {
        let like = PostLike {
            user: UserId::new(),
            post: PostId::new(),
            like_or_dislike: false,
            created_at: Utc::now(),
        };
        let stmt = statement_for(&RowChange::Update(Row::PostLike(like))).unwrap();
        assert_eq!(stmt.sql, "UPDATE post_likes SET body = $1 WHERE user_id = $2 AND post_id = $3");
        assert_eq!(stmt.binds.len(), 3);
        assert_eq!(stmt.binds[2], Bind::Uuid(*like.post.as_uuid()));
    }

    #[test]
    fn deletes_match_the_whole_key() {
        let (g, u) = (GroupId::new(), UserId::new());
        let stmt = statement_for(&RowChange::Delete(RowKey::Membership(g, u))).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM memberships WHERE group_id = $1 AND user_id = $2");
        assert_eq!(stmt.binds, vec![Bind::Uuid(*g.as_uuid()), Bind::Uuid(*u.as_uuid())]);

        let membership = Membership {
            user: u,
            group: g,
            joined_at: Utc::now(),
        };
        let insert = statement_for(&RowChange::Insert(Row::Membership(membership))).unwrap();
        assert_eq!(insert.sql, "INSERT INTO memberships (group_id, user_id, body) VALUES ($1, $2, $3)");
    }

    #[test]
    fn post_level_flags_use_the_nil_comment_id() {
        let flag = Flag {
            user: UserId::new(),
            post: PostId::new(),
            comment: None,
            status: "spam".into(),
            created_at: Utc::now(),
        };
        let stmt = statement_for(&RowChange::Delete(Row::Flag(flag.clone()).key())).unwrap();
        assert_eq!(stmt.binds[2], Bind::Uuid(Uuid::nil()));

        let comment = CommentId::new();
        let on_comment = Flag {
            comment: Some(comment),
            ..flag
        };
        let stmt = statement_for(&RowChange::Delete(Row::Flag(on_comment).key())).unwrap();
        assert_eq!(stmt.binds[2], Bind::Uuid(*comment.as_uuid()));
    }

    #[test]
    fn unique_violations_read_as_conflicts() {
        assert_eq!(conflict_message(Some("groups_name_key")), "Group name already exists.");
        assert_eq!(
            conflict_message(Some("memberships_pkey")),
            "User is already a member of this group."
        );
        assert_eq!(conflict_message(None), "A row with that key already exists.");
    }

    #[test]
    fn every_table_appears_in_the_schema() {
        for table in Table::ALL {
            assert!(
                SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {} (", table.name())),
                "missing table {}",
                table.name()
            );
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn current_thread_runtime_is_refused() {
        let backend = PostgresBackend::new(PgPoolOptions::new().connect_lazy("postgres://localhost/kidsbook").unwrap());
        let err = backend.load().unwrap_err();
        assert!(matches!(err, StoreError::Backend { operation: "load", .. }));
    }
}
