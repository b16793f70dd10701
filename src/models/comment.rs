//! Comment and reply model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{merge_field, UserSummary};

/// A comment on a post. `parent_id == None` means top-level; otherwise the
/// parent is always a top-level comment (one level of nesting).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(alias = "post")]
    pub post_id: String,
    #[serde(default, alias = "parentComment")]
    pub parent_id: Option<String>,
    pub author: UserSummary,
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "likes")]
    pub likes_count: u32,
    #[serde(default)]
    pub replies_count: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, alias = "isLiked")]
    pub is_liked_by_viewer: bool,
    /// Whether the viewer has the reply list open.
    #[serde(skip)]
    pub replies_expanded: bool,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Merge a `comment:update` payload, leaving client-only state alone.
    pub fn apply_patch(&mut self, patch: CommentPatch) {
        merge_field(&mut self.content, patch.content);
        merge_field(&mut self.likes_count, patch.likes_count);
        merge_field(&mut self.replies_count, patch.replies_count);
    }
}

/// Server payload of a `comment:update` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CommentPatch {
    #[serde(rename = "_id", alias = "id", alias = "commentId")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, alias = "likes", skip_serializing_if = "Option::is_none")]
    pub likes_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies_count: Option<u32>,
}

/// Request body for creating a comment or reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommentDraft {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl CommentDraft {
    pub fn to_optimistic(&self, post_id: &str, author: UserSummary, now: DateTime<Utc>) -> Comment {
        Comment {
            id: String::new(),
            post_id: post_id.to_string(),
            parent_id: self.parent_id.clone(),
            author,
            content: self.content.clone(),
            likes_count: 0,
            replies_count: 0,
            created_at: now,
            is_liked_by_viewer: false,
            replies_expanded: false,
        }
    }
}
