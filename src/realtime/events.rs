//! Typed push events and room commands.
//!
//! Frames on the wire are `{ "event": "<name>", "data": { ... } }`.

use serde::{Deserialize, Serialize};

use crate::models::{
    Comment, CommentPatch, Conversation, ConversationPatch, Message, Post, PostPatch, Reaction,
    UserId,
};

/// Payload of `postLiked` / `postUnliked`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostLikeEvent {
    pub post_id: String,
    pub user_id: UserId,
    #[serde(default)]
    pub likes_count: Option<u32>,
}

/// Payload of `postDeleted`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostDeletedEvent {
    pub post_id: String,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// Payload of `comment:like`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommentLikeEvent {
    pub comment_id: String,
    pub post_id: String,
    pub user_id: UserId,
    pub liked: bool,
}

/// Payload of `comment:delete`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommentDeleteEvent {
    pub comment_id: String,
    pub post_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Authoritative post comment count after the delete, when sent.
    #[serde(default)]
    pub comments_count: Option<u32>,
}

/// Payload of `conversation:deleted`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDeletedEvent {
    pub conversation_id: String,
}

/// Payload of `message:reaction`: the full reaction list after the change.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageReactionEvent {
    pub message_id: String,
    pub conversation_id: String,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub reactions: Vec<Reaction>,
}

/// Payload of `userFollowed` / `userUnfollowed`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FollowEvent {
    pub follower_id: UserId,
    pub following_id: UserId,
}

/// Every push event the client understands.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "postLiked")]
    PostLiked(PostLikeEvent),
    #[serde(rename = "postUnliked")]
    PostUnliked(PostLikeEvent),
    #[serde(rename = "postUpdated")]
    PostUpdated(PostPatch),
    #[serde(rename = "postDeleted")]
    PostDeleted(PostDeletedEvent),
    #[serde(rename = "newPost")]
    NewPost(Post),
    #[serde(rename = "comment:new")]
    CommentNew(Comment),
    #[serde(rename = "comment:reply")]
    CommentReply(Comment),
    #[serde(rename = "comment:like")]
    CommentLike(CommentLikeEvent),
    #[serde(rename = "comment:delete")]
    CommentDelete(CommentDeleteEvent),
    #[serde(rename = "comment:update")]
    CommentUpdate(CommentPatch),
    #[serde(rename = "conversation:created")]
    ConversationCreated(Conversation),
    #[serde(rename = "conversation:deleted")]
    ConversationDeleted(ConversationDeletedEvent),
    #[serde(rename = "conversation:update")]
    ConversationUpdate(ConversationPatch),
    #[serde(rename = "message:new")]
    MessageNew(Message),
    #[serde(rename = "message:reaction")]
    MessageReaction(MessageReactionEvent),
    #[serde(rename = "userFollowed")]
    UserFollowed(FollowEvent),
    #[serde(rename = "userUnfollowed")]
    UserUnfollowed(FollowEvent),
}

/// Event discriminant used for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PostLiked,
    PostUnliked,
    PostUpdated,
    PostDeleted,
    NewPost,
    CommentNew,
    CommentReply,
    CommentLike,
    CommentDelete,
    CommentUpdate,
    ConversationCreated,
    ConversationDeleted,
    ConversationUpdate,
    MessageNew,
    MessageReaction,
    UserFollowed,
    UserUnfollowed,
}

impl EventKind {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::PostLiked => "postLiked",
            EventKind::PostUnliked => "postUnliked",
            EventKind::PostUpdated => "postUpdated",
            EventKind::PostDeleted => "postDeleted",
            EventKind::NewPost => "newPost",
            EventKind::CommentNew => "comment:new",
            EventKind::CommentReply => "comment:reply",
            EventKind::CommentLike => "comment:like",
            EventKind::CommentDelete => "comment:delete",
            EventKind::CommentUpdate => "comment:update",
            EventKind::ConversationCreated => "conversation:created",
            EventKind::ConversationDeleted => "conversation:deleted",
            EventKind::ConversationUpdate => "conversation:update",
            EventKind::MessageNew => "message:new",
            EventKind::MessageReaction => "message:reaction",
            EventKind::UserFollowed => "userFollowed",
            EventKind::UserUnfollowed => "userUnfollowed",
        }
    }
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::PostLiked(_) => EventKind::PostLiked,
            ServerEvent::PostUnliked(_) => EventKind::PostUnliked,
            ServerEvent::PostUpdated(_) => EventKind::PostUpdated,
            ServerEvent::PostDeleted(_) => EventKind::PostDeleted,
            ServerEvent::NewPost(_) => EventKind::NewPost,
            ServerEvent::CommentNew(_) => EventKind::CommentNew,
            ServerEvent::CommentReply(_) => EventKind::CommentReply,
            ServerEvent::CommentLike(_) => EventKind::CommentLike,
            ServerEvent::CommentDelete(_) => EventKind::CommentDelete,
            ServerEvent::CommentUpdate(_) => EventKind::CommentUpdate,
            ServerEvent::ConversationCreated(_) => EventKind::ConversationCreated,
            ServerEvent::ConversationDeleted(_) => EventKind::ConversationDeleted,
            ServerEvent::ConversationUpdate(_) => EventKind::ConversationUpdate,
            ServerEvent::MessageNew(_) => EventKind::MessageNew,
            ServerEvent::MessageReaction(_) => EventKind::MessageReaction,
            ServerEvent::UserFollowed(_) => EventKind::UserFollowed,
            ServerEvent::UserUnfollowed(_) => EventKind::UserUnfollowed,
        }
    }

    /// Decode one wire frame. Unknown or malformed frames are dropped.
    pub fn decode(frame: &str) -> Option<Self> {
        match serde_json::from_str(frame) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::debug!("Dropping push frame: {}", e);
                None
            }
        }
    }
}

/// Commands the client sends on the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientCommand {
    /// Start receiving comment activity for a post.
    #[serde(rename = "post:join")]
    JoinPost(String),
    /// Stop receiving comment activity for a post.
    #[serde(rename = "post:leave")]
    LeavePost(String),
}

impl ClientCommand {
    pub fn to_frame(&self) -> String {
        // Serializing a newtype enum of `String` cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}
