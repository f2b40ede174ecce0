//! Likes, shares and flags.
//!
//! Likes upsert per (user, target); flags upsert per (user, post, comment?);
//! shares insert a row on every call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use kidsbook_core::coerce::{coerce_bool_or, coerce_string};
use kidsbook_core::{CommentId, DomainError, DomainResult, PostId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostLike {
    pub user: UserId,
    pub post: PostId,
    pub like_or_dislike: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentLike {
    pub user: UserId,
    pub comment: CommentId,
    pub like_or_dislike: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub user: UserId,
    pub post: PostId,
    pub created_at: DateTime<Utc>,
}

/// A moderation flag on a post, or on one of its comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    pub user: UserId,
    pub post: PostId,
    pub comment: Option<CommentId>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Flag {
    /// Unique key of a flag row.
    pub fn key(&self) -> (UserId, PostId, Option<CommentId>) {
        (self.user, self.post, self.comment)
    }
}

/// `like_or_dislike` from a request body; absent means a like.
pub fn parse_like_value(body: &Map<String, Value>) -> DomainResult<bool> {
    coerce_bool_or("like_or_dislike", body.get("like_or_dislike"), true)
}

/// `status` from a flag request body; required and non-empty.
pub fn parse_flag_status(body: &Map<String, Value>) -> DomainResult<String> {
    let status = body
        .get("status")
        .map(|v| coerce_string("status", v))
        .transpose()?
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    if status.is_empty() {
        return Err(DomainError::validation("status is required"));
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn like_defaults_to_true_and_accepts_strings() {
        assert!(parse_like_value(json!({}).as_object().unwrap()).unwrap());
        assert!(!parse_like_value(json!({ "like_or_dislike": "false" }).as_object().unwrap()).unwrap());
        assert!(!parse_like_value(json!({ "like_or_dislike": false }).as_object().unwrap()).unwrap());
    }

    #[test]
    fn flag_status_is_required() {
        assert!(parse_flag_status(json!({}).as_object().unwrap()).is_err());
        assert_eq!(
            parse_flag_status(json!({ "status": " inappropriate " }).as_object().unwrap()).unwrap(),
            "inappropriate"
        );
    }
}
