use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kidsbook_core::{CommentId, DomainError, DomainResult, Entity, PostId, UserId};

const MAX_COMMENT_LEN: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post: PostId,
    pub creator: UserId,
    pub content: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity for Comment {
    type Id = CommentId;

    fn id(&self) -> CommentId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateComment {
    pub content: String,
}

impl Comment {
    pub fn create(
        cmd: CreateComment,
        post: PostId,
        creator: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let content = cmd.content.trim();
        if content.is_empty() {
            return Err(DomainError::validation("content cannot be empty"));
        }
        if content.chars().count() > MAX_COMMENT_LEN {
            return Err(DomainError::validation(format!(
                "comment cannot exceed {MAX_COMMENT_LEN} characters"
            )));
        }
        Ok(Self {
            id: CommentId::new(),
            post,
            creator,
            content: content.to_string(),
            is_deleted: false,
            created_at: occurred_at,
        })
    }

    pub fn soft_delete(&mut self) -> DomainResult<()> {
        if self.is_deleted {
            return Err(DomainError::invalid_operation("Comment is already deleted."));
        }
        self.is_deleted = true;
        Ok(())
    }
}
