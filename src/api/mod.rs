//! REST API module.
//!
//! Contains the response envelope contract, list pagination normalization, and
//! the collaborator traits the sync layer depends on. `HttpApi` is the
//! production implementation of every trait.

mod envelope;
mod http;

pub use envelope::*;
pub use http::*;

use chrono::NaiveDate;

use crate::errors::ClientResult;
use crate::models::{
    Artist, Comment, CommentDraft, Conversation, FollowCounts, Message, Post, PostDraft, UserId,
};
use crate::search::ArtistFilter;

/// Feed endpoints.
#[allow(async_fn_in_trait)]
pub trait FeedApi {
    async fn list_posts(&self, page: u32, limit: u32) -> ClientResult<Page<Post>>;
    async fn create_post(&self, draft: &PostDraft) -> ClientResult<Post>;
    async fn like_post(&self, post_id: &str) -> ClientResult<()>;
    async fn unlike_post(&self, post_id: &str) -> ClientResult<()>;
    async fn delete_post(&self, post_id: &str) -> ClientResult<()>;
}

/// Comment endpoints.
#[allow(async_fn_in_trait)]
pub trait CommentApi {
    async fn list_comments(&self, post_id: &str) -> ClientResult<Vec<Comment>>;
    async fn list_replies(&self, comment_id: &str) -> ClientResult<Vec<Comment>>;
    async fn create_comment(&self, post_id: &str, draft: &CommentDraft) -> ClientResult<Comment>;
    async fn like_comment(&self, comment_id: &str) -> ClientResult<()>;
    async fn unlike_comment(&self, comment_id: &str) -> ClientResult<()>;
    async fn delete_comment(&self, comment_id: &str) -> ClientResult<()>;
}

/// Chat endpoints.
#[allow(async_fn_in_trait)]
pub trait ChatApi {
    async fn list_conversations(&self) -> ClientResult<Vec<Conversation>>;
    async fn list_messages(&self, conversation_id: &str, page: u32) -> ClientResult<Page<Message>>;
    async fn send_message(&self, conversation_id: &str, content: &str) -> ClientResult<Message>;
    async fn react_to_message(&self, message_id: &str, emoji: &str) -> ClientResult<Message>;
    async fn set_pinned(&self, conversation_id: &str, pinned: bool) -> ClientResult<()>;
}

/// Follow endpoints.
#[allow(async_fn_in_trait)]
pub trait FollowApi {
    async fn following_ids(&self) -> ClientResult<Vec<UserId>>;
    async fn follow(&self, user_id: &str) -> ClientResult<()>;
    async fn unfollow(&self, user_id: &str) -> ClientResult<()>;
    async fn follow_counts(&self, user_id: &str) -> ClientResult<FollowCounts>;
}

/// Artist search endpoints.
#[allow(async_fn_in_trait)]
pub trait ArtistApi {
    async fn search_artists(
        &self,
        filter: &ArtistFilter,
        page: u32,
        limit: u32,
    ) -> ClientResult<Page<Artist>>;
    async fn available_artists(&self, date: NaiveDate) -> ClientResult<Vec<Artist>>;
}

/// Degrade a failed read to an empty value. Reads never propagate past the
/// sync layer; the failure is only logged.
pub fn or_empty<T: Default>(result: ClientResult<T>, what: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Failed to load {}: {}", what, e);
            T::default()
        }
    }
}
