//! Feed post model.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{merge_field, UserSummary};

/// Kind of attached media.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// One media attachment, in display order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Media {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub url: String,
}

/// Visibility of a post.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Published,
    Private,
}

/// A post in the social feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub author: UserSummary,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub media: Vec<Media>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, alias = "likes")]
    pub likes_count: u32,
    #[serde(default, alias = "comments")]
    pub comments_count: u32,
    #[serde(default)]
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    /// Whether the viewer has liked this post. Only ever set from the
    /// viewer's own actions or the viewer-scoped list response.
    #[serde(default, alias = "isLiked")]
    pub is_liked_by_viewer: bool,
}

/// Server payload of a `postUpdated` event. Absent fields are unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PostPatch {
    #[serde(rename = "_id", alias = "id", alias = "postId")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<Media>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PostStatus>,
    #[serde(default, alias = "likes", skip_serializing_if = "Option::is_none")]
    pub likes_count: Option<u32>,
    #[serde(default, alias = "comments", skip_serializing_if = "Option::is_none")]
    pub comments_count: Option<u32>,
}

impl Post {
    /// Merge an update payload, leaving client-only state alone.
    pub fn apply_patch(&mut self, patch: PostPatch) {
        merge_field(&mut self.content, patch.content);
        merge_field(&mut self.media, patch.media);
        merge_field(&mut self.tags, patch.tags);
        merge_field(&mut self.status, patch.status);
        merge_field(&mut self.likes_count, patch.likes_count);
        merge_field(&mut self.comments_count, patch.comments_count);
    }
}

/// Request body for creating a post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PostDraft {
    pub content: String,
    #[serde(default)]
    pub media: Vec<Media>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub status: PostStatus,
}

impl PostDraft {
    /// Build the optimistic copy shown before the server assigns an id.
    pub fn to_optimistic(&self, author: UserSummary, now: DateTime<Utc>) -> Post {
        Post {
            id: String::new(),
            author,
            content: self.content.clone(),
            media: self.media.clone(),
            tags: self.tags.clone(),
            likes_count: 0,
            comments_count: 0,
            status: self.status,
            created_at: now,
            is_liked_by_viewer: false,
        }
    }
}
