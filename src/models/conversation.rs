//! Chat conversation and message models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{double_option, merge_field, UserId, UserSummary};

/// Conversation kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConversationType {
    Private,
    Group,
}

/// Denormalized snapshot of the latest message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessagePreview {
    pub content: String,
    #[serde(alias = "sender")]
    pub sender_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// A private or group conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ConversationType,
    pub participants: Vec<UserSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<MessagePreview>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// For a private conversation, the participant who is not the viewer.
    pub fn counterpart(&self, viewer_id: &str) -> Option<&UserSummary> {
        match self.kind {
            ConversationType::Private => self.participants.iter().find(|p| p.id != viewer_id),
            ConversationType::Group => None,
        }
    }

    /// Name shown in the conversation list.
    pub fn display_name(&self, viewer_id: &str) -> String {
        match self.kind {
            ConversationType::Private => self
                .counterpart(viewer_id)
                .map(|p| p.name.clone())
                .unwrap_or_default(),
            ConversationType::Group => self.name.clone().unwrap_or_else(|| {
                self.participants
                    .iter()
                    .filter(|p| p.id != viewer_id)
                    .map(|p| p.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            }),
        }
    }

    /// Avatar shown in the conversation list.
    pub fn display_avatar(&self, viewer_id: &str) -> Option<String> {
        match self.kind {
            ConversationType::Private => self.counterpart(viewer_id).and_then(|p| p.avatar.clone()),
            ConversationType::Group => self.avatar.clone(),
        }
    }

    /// Merge a `conversation:update` payload.
    pub fn apply_patch(&mut self, patch: ConversationPatch) {
        merge_field(&mut self.participants, patch.participants);
        merge_field(&mut self.name, patch.name);
        merge_field(&mut self.avatar, patch.avatar);
        merge_field(&mut self.is_pinned, patch.is_pinned);
        merge_field(&mut self.last_message, patch.last_message);
        merge_field(&mut self.updated_at, patch.updated_at);
    }
}

/// Server payload of a `conversation:update` event. Nullable fields use a
/// nested option: `None` = absent, `Some(None)` = cleared.
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPatch {
    #[serde(rename = "_id", alias = "id", alias = "conversationId")]
    pub id: String,
    #[serde(default)]
    pub participants: Option<Vec<UserSummary>>,
    #[serde(default, deserialize_with = "double_option")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub avatar: Option<Option<String>>,
    #[serde(default)]
    pub is_pinned: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub last_message: Option<Option<MessagePreview>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One emoji reaction by one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub emoji: String,
    #[serde(alias = "userId")]
    pub user: UserId,
}

/// A chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(alias = "conversation")]
    pub conversation_id: String,
    #[serde(alias = "sender")]
    pub sender_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

impl Message {
    pub fn has_reaction(&self, emoji: &str, user: &str) -> bool {
        self.reactions
            .iter()
            .any(|r| r.emoji == emoji && r.user == user)
    }

    /// Toggle `user`'s `emoji` reaction. Returns true if it is now present.
    pub fn toggle_reaction(&mut self, emoji: &str, user: &str) -> bool {
        if self.has_reaction(emoji, user) {
            self.reactions
                .retain(|r| !(r.emoji == emoji && r.user == user));
            false
        } else {
            self.reactions.push(Reaction {
                emoji: emoji.to_string(),
                user: user.to_string(),
            });
            true
        }
    }

    pub fn preview(&self) -> MessagePreview {
        MessagePreview {
            content: self.content.clone(),
            sender_id: self.sender_id.clone(),
            created_at: self.created_at,
        }
    }
}
