use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use kidsbook_core::coerce::{coerce_bool_or, coerce_opt_string, coerce_string};
use kidsbook_core::{DomainError, DomainResult, Entity, GroupId, PostId, UserId};

/// A post inside one group.
///
/// Deletion is soft: the row stays for moderation views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub group: GroupId,
    pub creator: UserId,
    pub content: String,
    pub picture: Option<String>,
    pub link: Option<String>,
    /// Link preview text. Fetching previews is out of scope; clients may supply it.
    pub ogp: Option<String>,
    pub is_deleted: bool,
    pub is_sponsored: bool,
    pub is_announcement: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity for Post {
    type Id = PostId;

    fn id(&self) -> PostId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Command to create a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePost {
    pub content: String,
    pub picture: Option<String>,
    pub link: Option<String>,
    pub ogp: Option<String>,
    pub is_sponsored: bool,
    pub is_announcement: bool,
}

impl CreatePost {
    /// Parse a loosely-typed request body. Flags accept `"true"`/`"false"` strings.
    pub fn parse(body: &Map<String, Value>) -> DomainResult<Self> {
        let content = body
            .get("content")
            .map(|v| coerce_string("content", v))
            .transpose()?
            .unwrap_or_default();

        let opt = |name: &str| -> DomainResult<Option<String>> {
            body.get(name).map(|v| coerce_opt_string(name, v)).transpose().map(Option::flatten)
        };

        Ok(Self {
            content,
            picture: opt("picture")?,
            link: opt("link")?,
            ogp: opt("ogp")?,
            is_sponsored: coerce_bool_or("is_sponsored", body.get("is_sponsored"), false)?,
            is_announcement: coerce_bool_or("is_announcement", body.get("is_announcement"), false)?,
        })
    }
}

impl Post {
    pub fn create(
        cmd: CreatePost,
        group: GroupId,
        creator: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if cmd.content.trim().is_empty() {
            return Err(DomainError::validation("content cannot be empty"));
        }
        Ok(Self {
            id: PostId::new(),
            group,
            creator,
            content: cmd.content,
            picture: cmd.picture,
            link: cmd.link,
            ogp: cmd.ogp,
            is_deleted: false,
            is_sponsored: cmd.is_sponsored,
            is_announcement: cmd.is_announcement,
            created_at: occurred_at,
        })
    }

    pub fn soft_delete(&mut self) -> DomainResult<()> {
        if self.is_deleted {
            return Err(DomainError::invalid_operation("Post is already deleted."));
        }
        self.is_deleted = true;
        Ok(())
    }
}
