//! Chat reconciliation: the conversation list and the open message thread.

use chrono::Utc;

use super::engine::{EntityKey, Position, ReconcileList, Settled};
use super::ranking;
use crate::api::{or_empty, ChatApi};
use crate::errors::ClientResult;
use crate::models::{Conversation, Message, MessagePreview, Reaction};
use crate::realtime::{EventKind, ServerEvent};
use crate::session::ViewerContext;

/// A message send waiting on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub key: EntityKey,
    pub conversation_id: String,
}

/// An optimistic reaction toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionTicket {
    pub message_id: String,
    pub emoji: String,
    before: Vec<Reaction>,
    optimistic: Vec<Reaction>,
}

/// An optimistic pin toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinTicket {
    pub conversation_id: String,
    pub was_pinned: bool,
}

pub struct ChatSync {
    viewer: ViewerContext,
    conversations: ReconcileList<Conversation>,
    active: Option<String>,
    /// Messages of the active conversation, newest first.
    messages: ReconcileList<Message>,
}

impl ChatSync {
    /// Events the chat views subscribe to.
    pub const EVENTS: &'static [EventKind] = &[
        EventKind::ConversationCreated,
        EventKind::ConversationDeleted,
        EventKind::ConversationUpdate,
        EventKind::MessageNew,
        EventKind::MessageReaction,
    ];

    pub fn new(viewer: ViewerContext) -> Self {
        Self {
            viewer,
            conversations: ReconcileList::new(),
            active: None,
            messages: ReconcileList::new(),
        }
    }

    pub fn conversations(&self) -> &ReconcileList<Conversation> {
        &self.conversations
    }

    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn messages(&self) -> &ReconcileList<Message> {
        &self.messages
    }

    /// Name shown for a conversation from the viewer's side.
    pub fn display_name(&self, conversation_id: &str) -> Option<String> {
        self.conversations
            .get(conversation_id)
            .map(|c| c.display_name(self.viewer.id()))
    }

    fn resort(&mut self) {
        self.conversations.sort_by(ranking::conversation_order);
    }

    /// Load the conversation list. Failures leave an empty list.
    pub async fn load_conversations<A: ChatApi>(&mut self, api: &A) {
        let items = or_empty(api.list_conversations().await, "conversations");
        self.conversations = ReconcileList::from_server(items);
        self.resort();
    }

    /// Open a conversation and load its latest messages.
    pub async fn open<A: ChatApi>(&mut self, api: &A, conversation_id: &str) -> bool {
        if !self.conversations.contains(conversation_id) {
            return false;
        }
        self.active = Some(conversation_id.to_string());
        let page = or_empty(api.list_messages(conversation_id, 1).await, "messages");
        // Another conversation may have been opened meanwhile.
        if self.active.as_deref() != Some(conversation_id) {
            return false;
        }
        self.messages = ReconcileList::from_server(page.items);
        self.messages.sort_by(ranking::newest_first);
        true
    }

    pub fn close(&mut self) {
        self.active = None;
        self.messages.clear();
    }

    /// Apply one push event.
    pub fn handle_event(&mut self, event: &ServerEvent) -> bool {
        match event {
            ServerEvent::ConversationCreated(conversation) => {
                let inserted = self
                    .conversations
                    .insert_if_absent(conversation.clone(), Position::Head);
                if inserted {
                    self.resort();
                }
                inserted
            }
            ServerEvent::ConversationDeleted(deleted) => {
                let removed = self
                    .conversations
                    .remove_entity(&deleted.conversation_id)
                    .is_some();
                if self.active.as_deref() == Some(deleted.conversation_id.as_str()) {
                    self.close();
                    return true;
                }
                removed
            }
            ServerEvent::ConversationUpdate(patch) => {
                let patch = patch.clone();
                let id = patch.id.clone();
                let changed = self
                    .conversations
                    .apply_entity_replace(&id, |c| c.apply_patch(patch));
                if changed {
                    self.resort();
                }
                changed
            }
            ServerEvent::MessageNew(message) => self.receive_message(message.clone()),
            ServerEvent::MessageReaction(reaction) => {
                if self.active.as_deref() != Some(reaction.conversation_id.as_str()) {
                    return false;
                }
                let reactions = reaction.reactions.clone();
                self.messages
                    .apply_entity_replace(&reaction.message_id, |m| m.reactions = reactions)
            }
            _ => false,
        }
    }

    /// Move a conversation's last message forward. Older messages never
    /// replace a newer preview.
    fn bump(&mut self, conversation_id: &str, preview: MessagePreview) -> bool {
        let mut moved = false;
        self.conversations.apply_entity_replace(conversation_id, |c| {
            if c.updated_at <= preview.created_at {
                c.updated_at = preview.created_at;
                c.last_message = Some(preview);
                moved = true;
            }
        });
        if moved {
            self.resort();
        }
        moved
    }

    fn receive_message(&mut self, message: Message) -> bool {
        let bumped = self.bump(&message.conversation_id, message.preview());

        let in_thread = self.active.as_deref() == Some(message.conversation_id.as_str())
            && self.messages.insert_if_absent(message, Position::Head);
        bumped || in_thread
    }

    /// Show the viewer's message before the server confirms it.
    pub fn begin_send(&mut self, content: &str) -> Option<PendingMessage> {
        let conversation_id = self.active.clone()?;
        let message = Message {
            id: String::new(),
            conversation_id: conversation_id.clone(),
            sender_id: self.viewer.id().to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
            reactions: Vec::new(),
        };
        Some(PendingMessage {
            key: self.messages.insert_local(message, Position::Head),
            conversation_id,
        })
    }

    pub fn settle_send(&mut self, pending: &PendingMessage, result: ClientResult<Message>) -> Settled {
        if self.active.as_deref() != Some(pending.conversation_id.as_str()) {
            tracing::debug!("Send settled after leaving conversation {}", pending.conversation_id);
            return Settled::Stale;
        }
        match result {
            Ok(message) => {
                self.bump(&pending.conversation_id, message.preview());
                self.messages.confirm_local(&pending.key, message)
            }
            Err(e) => {
                tracing::warn!("Sending message failed, removing optimistic copy: {}", e);
                match self.messages.discard_local(&pending.key) {
                    Some(_) => Settled::RolledBack,
                    None => Settled::Stale,
                }
            }
        }
    }

    pub async fn send<A: ChatApi>(&mut self, api: &A, content: &str) -> Settled {
        let Some(pending) = self.begin_send(content) else {
            return Settled::Stale;
        };
        let result = api.send_message(&pending.conversation_id, content).await;
        self.settle_send(&pending, result)
    }

    /// Toggle the viewer's reaction. Sending the same emoji again removes it.
    pub fn begin_react(&mut self, message_id: &str, emoji: &str) -> Option<ReactionTicket> {
        let before = self.messages.get(message_id)?.reactions.clone();
        let viewer_id = self.viewer.id().to_string();
        let mut optimistic = Vec::new();
        self.messages.apply_entity_replace(message_id, |m| {
            m.toggle_reaction(emoji, &viewer_id);
            optimistic = m.reactions.clone();
        });
        Some(ReactionTicket {
            message_id: message_id.to_string(),
            emoji: emoji.to_string(),
            before,
            optimistic,
        })
    }

    pub fn settle_react(&mut self, ticket: &ReactionTicket, result: ClientResult<Message>) -> Settled {
        if !self.messages.contains(&ticket.message_id) {
            return Settled::Stale;
        }
        match result {
            Ok(message) => {
                let reactions = message.reactions;
                self.messages
                    .apply_entity_replace(&ticket.message_id, |m| m.reactions = reactions);
                Settled::Confirmed
            }
            Err(e) => {
                tracing::warn!("Reaction on {} failed, rolling back: {}", ticket.message_id, e);
                // A reaction event may already have replaced the list.
                let current = self.messages.get(&ticket.message_id).map(|m| &m.reactions);
                if current != Some(&ticket.optimistic) {
                    return Settled::Stale;
                }
                let before = ticket.before.clone();
                self.messages
                    .apply_entity_replace(&ticket.message_id, |m| m.reactions = before);
                Settled::RolledBack
            }
        }
    }

    pub async fn react<A: ChatApi>(&mut self, api: &A, message_id: &str, emoji: &str) -> Settled {
        let Some(ticket) = self.begin_react(message_id, emoji) else {
            return Settled::Stale;
        };
        let result = api.react_to_message(message_id, emoji).await;
        self.settle_react(&ticket, result)
    }

    pub fn begin_pin(&mut self, conversation_id: &str) -> Option<PinTicket> {
        let was_pinned = self.conversations.get(conversation_id)?.is_pinned;
        self.conversations
            .apply_entity_replace(conversation_id, |c| c.is_pinned = !was_pinned);
        self.resort();
        Some(PinTicket {
            conversation_id: conversation_id.to_string(),
            was_pinned,
        })
    }

    pub fn settle_pin(&mut self, ticket: &PinTicket, result: ClientResult<()>) -> Settled {
        let Err(e) = result else {
            return Settled::Confirmed;
        };
        tracing::warn!("Pin on {} failed, rolling back: {}", ticket.conversation_id, e);
        let restored = self
            .conversations
            .apply_entity_replace(&ticket.conversation_id, |c| c.is_pinned = ticket.was_pinned);
        if !restored {
            return Settled::Stale;
        }
        self.resort();
        Settled::RolledBack
    }

    pub async fn toggle_pin<A: ChatApi>(&mut self, api: &A, conversation_id: &str) -> Settled {
        let Some(ticket) = self.begin_pin(conversation_id) else {
            return Settled::Stale;
        };
        let result = api.set_pinned(conversation_id, !ticket.was_pinned).await;
        self.settle_pin(&ticket, result)
    }
}
