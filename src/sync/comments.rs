//! Comment tree reconciliation for one post's detail view.
//!
//! Top-level comments are tracked in one list. Replies live in per-parent
//! lists that only exist once the viewer expanded that parent; the parent's
//! `replies_count` is maintained independently of whether its replies are
//! loaded.

use std::collections::{HashMap, HashSet};

use chrono::Utc;

use super::engine::{
    Direction, EntityKey, LikeTicket, Position, ReconcileList, RemoteLike, Removed, Settled,
};
use crate::api::{or_empty, CommentApi};
use crate::errors::ClientResult;
use crate::models::{Comment, CommentDraft};
use crate::realtime::{EventKind, ServerEvent};
use crate::session::ViewerContext;

/// Side effects of a comment change that the owning feed applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentOutcome {
    pub post_id: String,
    /// Whether the comment tree changed.
    pub changed: bool,
    /// Change to the post's `comments_count`.
    pub comment_delta: i32,
}

impl CommentOutcome {
    /// Net effect of this outcome followed by `next` on the same post.
    pub fn followed_by(self, next: CommentOutcome) -> CommentOutcome {
        CommentOutcome {
            post_id: self.post_id,
            changed: self.changed || next.changed,
            comment_delta: self.comment_delta + next.comment_delta,
        }
    }
}

/// Where a comment lives in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    TopLevel,
    Reply { parent_id: String },
}

/// A comment or reply creation waiting on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingComment {
    /// `None` for a reply whose parent's replies are not loaded; only the
    /// counter moved.
    pub key: Option<EntityKey>,
    pub parent_id: Option<String>,
}

/// An optimistic comment delete, restorable on failure.
#[derive(Debug, Clone)]
pub struct PendingDelete {
    removed: Removed<Comment>,
    parent_id: Option<String>,
    /// Replies dropped along with a top-level comment.
    replies: Option<ReconcileList<Comment>>,
}

pub struct CommentSync {
    post_id: String,
    viewer: ViewerContext,
    comments: ReconcileList<Comment>,
    replies: HashMap<String, ReconcileList<Comment>>,
    /// Creations in flight whose echo has not been seen yet.
    unmatched_creates: usize,
    /// Comments created from this view. Counted once, when begun.
    own_ids: HashSet<String>,
}

impl CommentSync {
    /// Events the detail view subscribes to (after joining the post's room).
    pub const EVENTS: &'static [EventKind] = &[
        EventKind::CommentNew,
        EventKind::CommentReply,
        EventKind::CommentLike,
        EventKind::CommentDelete,
        EventKind::CommentUpdate,
    ];

    pub fn new(post_id: &str, viewer: ViewerContext) -> Self {
        Self {
            post_id: post_id.to_string(),
            viewer,
            comments: ReconcileList::new(),
            replies: HashMap::new(),
            unmatched_creates: 0,
            own_ids: HashSet::new(),
        }
    }

    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    pub fn comments(&self) -> &ReconcileList<Comment> {
        &self.comments
    }

    pub fn comment(&self, id: &str) -> Option<&Comment> {
        match self.locate(id)? {
            Location::TopLevel => self.comments.get(id),
            Location::Reply { parent_id } => self.replies.get(&parent_id)?.get(id),
        }
    }

    /// Loaded replies of a top-level comment; `None` until first expanded.
    pub fn replies(&self, parent_id: &str) -> Option<&ReconcileList<Comment>> {
        self.replies.get(parent_id)
    }

    fn outcome(&self, changed: bool, comment_delta: i32) -> CommentOutcome {
        CommentOutcome {
            post_id: self.post_id.clone(),
            changed,
            comment_delta,
        }
    }

    /// Find a comment by scanning the top level, then each loaded reply list.
    fn locate(&self, id: &str) -> Option<Location> {
        if self.comments.contains(id) {
            return Some(Location::TopLevel);
        }
        self.replies
            .iter()
            .find(|(_, list)| list.contains(id))
            .map(|(parent_id, _)| Location::Reply {
                parent_id: parent_id.clone(),
            })
    }

    fn list_mut(&mut self, location: &Location) -> Option<&mut ReconcileList<Comment>> {
        match location {
            Location::TopLevel => Some(&mut self.comments),
            Location::Reply { parent_id } => self.replies.get_mut(parent_id),
        }
    }

    /// Load top-level comments. Failures leave an empty list.
    pub async fn load<A: CommentApi>(&mut self, api: &A) {
        let mut items = or_empty(api.list_comments(&self.post_id).await, "comments");
        items.retain(|c| !c.is_reply());
        self.comments = ReconcileList::from_server(items);
        self.replies.clear();
    }

    /// Expand or collapse a comment's replies, fetching them on first expand.
    pub async fn toggle_replies<A: CommentApi>(&mut self, api: &A, comment_id: &str) -> bool {
        let Some(comment) = self.comments.get(comment_id) else {
            return false;
        };
        let expanding = !comment.replies_expanded;

        if expanding && !self.replies.contains_key(comment_id) {
            let items = or_empty(api.list_replies(comment_id).await, "replies");
            // The parent may have been deleted while the fetch was in flight.
            if !self.comments.contains(comment_id) {
                return false;
            }
            let mut list = ReconcileList::from_server(items);
            list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            self.replies.insert(comment_id.to_string(), list);
        }

        self.comments
            .apply_entity_replace(comment_id, |c| c.replies_expanded = expanding)
    }

    /// Apply one push event for this post.
    pub fn handle_event(&mut self, event: &ServerEvent) -> CommentOutcome {
        match event {
            ServerEvent::CommentNew(comment) | ServerEvent::CommentReply(comment) => {
                if comment.post_id != self.post_id {
                    return self.outcome(false, 0);
                }
                self.insert_remote(comment.clone())
            }
            ServerEvent::CommentLike(like) => {
                let Some(location) = self.locate(&like.comment_id) else {
                    return self.outcome(false, 0);
                };
                let is_self = self.viewer.is_self(&like.user_id);
                let direction = Direction::from_liked(like.liked);
                let applied = self
                    .list_mut(&location)
                    .map(|list| list.apply_remote_like(&like.comment_id, direction, is_self))
                    == Some(RemoteLike::Applied);
                self.outcome(applied, 0)
            }
            ServerEvent::CommentUpdate(patch) => {
                let Some(location) = self.locate(&patch.id) else {
                    return self.outcome(false, 0);
                };
                let patch = patch.clone();
                let id = patch.id.clone();
                let changed = self
                    .list_mut(&location)
                    .is_some_and(|list| list.apply_entity_replace(&id, |c| c.apply_patch(patch)));
                self.outcome(changed, 0)
            }
            ServerEvent::CommentDelete(deleted) => {
                if deleted.post_id != self.post_id {
                    return self.outcome(false, 0);
                }
                self.remove_remote(&deleted.comment_id, deleted.parent_id.as_deref())
            }
            _ => self.outcome(false, 0),
        }
    }

    fn insert_remote(&mut self, comment: Comment) -> CommentOutcome {
        let duplicate = match &comment.parent_id {
            None => self.comments.contains(&comment.id),
            Some(parent_id) => self.replies_contains(parent_id, &comment.id),
        };
        if duplicate {
            return self.outcome(false, 0);
        }
        let self_echo = self.claim_echo(&comment);

        match comment.parent_id.clone() {
            None => {
                let inserted = self.comments.insert_if_absent(comment, Position::Head);
                self.outcome(inserted, if inserted && !self_echo { 1 } else { 0 })
            }
            Some(parent_id) => {
                if !self_echo {
                    self.comments.apply_entity_replace(&parent_id, |parent| {
                        parent.replies_count = parent.replies_count.saturating_add(1)
                    });
                }
                let listed = match self.replies.get_mut(&parent_id) {
                    Some(list) => list.insert_if_absent(comment, Position::Tail),
                    None => false,
                };
                self.outcome(listed || !self_echo, if self_echo { 0 } else { 1 })
            }
        }
    }

    /// Whether `comment` is the echo of one this view created. An own
    /// comment arriving while a create is in flight is taken to be its echo.
    fn claim_echo(&mut self, comment: &Comment) -> bool {
        if self.own_ids.contains(&comment.id) {
            tracing::debug!("Comment {} is an echo of a confirmed create", comment.id);
            return true;
        }
        if self.viewer.is_self(&comment.author.id) && self.unmatched_creates > 0 {
            tracing::debug!("Comment {} is an echo of a pending create", comment.id);
            self.unmatched_creates -= 1;
            self.own_ids.insert(comment.id.clone());
            return true;
        }
        false
    }

    fn replies_contains(&self, parent_id: &str, id: &str) -> bool {
        self.replies
            .get(parent_id)
            .is_some_and(|list| list.contains(id))
    }

    fn remove_remote(&mut self, comment_id: &str, parent_hint: Option<&str>) -> CommentOutcome {
        match self.locate(comment_id) {
            Some(Location::TopLevel) => {
                self.comments.remove_entity(comment_id);
                self.replies.remove(comment_id);
                self.outcome(true, -1)
            }
            Some(Location::Reply { parent_id }) => {
                if let Some(list) = self.replies.get_mut(&parent_id) {
                    list.remove_entity(comment_id);
                }
                self.decrement_replies(&parent_id);
                self.outcome(true, -1)
            }
            None => match parent_hint {
                // Replies never loaded: only the counter can change.
                Some(parent_id) if !self.replies.contains_key(parent_id) => {
                    let changed = self.decrement_replies(parent_id);
                    self.outcome(changed, if changed { -1 } else { 0 })
                }
                _ => self.outcome(false, 0),
            },
        }
    }

    fn decrement_replies(&mut self, parent_id: &str) -> bool {
        self.comments.apply_entity_replace(parent_id, |parent| {
            parent.replies_count = parent.replies_count.saturating_sub(1)
        })
    }

    /// Optimistically flip the viewer's like on a comment or reply.
    pub fn begin_like(&mut self, comment_id: &str) -> Option<LikeTicket> {
        let location = self.locate(comment_id)?;
        self.list_mut(&location)?.begin_like_toggle(comment_id)
    }

    pub fn settle_like(&mut self, ticket: &LikeTicket, result: ClientResult<()>) -> Settled {
        if let Err(e) = &result {
            tracing::warn!("Like on comment {} failed, rolling back: {}", ticket.entity_id, e);
        }
        let Some(location) = self.locate(&ticket.entity_id) else {
            return Settled::Stale;
        };
        match self.list_mut(&location) {
            Some(list) => list.settle_like(ticket, result.is_ok()),
            None => Settled::Stale,
        }
    }

    pub async fn toggle_like<A: CommentApi>(&mut self, api: &A, comment_id: &str) -> Settled {
        let Some(ticket) = self.begin_like(comment_id) else {
            return Settled::Stale;
        };
        let result = match ticket.direction {
            Direction::Up => api.like_comment(comment_id).await,
            Direction::Down => api.unlike_comment(comment_id).await,
        };
        self.settle_like(&ticket, result)
    }

    /// Show the viewer's comment or reply before the server confirms it.
    /// Returns `None` when replying to a comment that is not top-level here.
    pub fn begin_create(&mut self, draft: &CommentDraft) -> Option<(PendingComment, CommentOutcome)> {
        let comment = draft.to_optimistic(&self.post_id, self.viewer.user.clone(), Utc::now());
        let key = match &draft.parent_id {
            None => Some(self.comments.insert_local(comment, Position::Head)),
            Some(parent_id) => {
                if !self.comments.contains(parent_id) {
                    return None;
                }
                self.comments.apply_entity_replace(parent_id, |parent| {
                    parent.replies_count = parent.replies_count.saturating_add(1)
                });
                self.replies
                    .get_mut(parent_id)
                    .map(|list| list.insert_local(comment, Position::Tail))
            }
        };
        self.unmatched_creates += 1;

        let pending = PendingComment {
            key,
            parent_id: draft.parent_id.clone(),
        };
        Some((pending, self.outcome(true, 1)))
    }

    fn list_for(&mut self, parent_id: Option<&str>) -> Option<&mut ReconcileList<Comment>> {
        match parent_id {
            None => Some(&mut self.comments),
            Some(parent_id) => self.replies.get_mut(parent_id),
        }
    }

    /// Confirm or roll back a creation. The outcome is relative to the state
    /// left by `begin_create`.
    pub fn settle_create(
        &mut self,
        pending: &PendingComment,
        result: ClientResult<Comment>,
    ) -> (Settled, CommentOutcome) {
        let parent_id = pending.parent_id.as_deref();

        match result {
            Ok(comment) => {
                // Already claimed if the echo came first.
                if self.own_ids.insert(comment.id.clone()) {
                    self.unmatched_creates = self.unmatched_creates.saturating_sub(1);
                }
                let Some(key) = &pending.key else {
                    return (Settled::Confirmed, self.outcome(false, 0));
                };
                let settled = match self.list_for(parent_id) {
                    Some(list) => list.confirm_local(key, comment),
                    None => Settled::Stale,
                };
                (settled, self.outcome(settled == Settled::Confirmed, 0))
            }
            Err(e) => {
                tracing::warn!("Creating comment failed, removing optimistic copy: {}", e);
                self.unmatched_creates = self.unmatched_creates.saturating_sub(1);
                let discarded = match &pending.key {
                    Some(key) => self
                        .list_for(parent_id)
                        .is_some_and(|list| list.discard_local(key).is_some()),
                    None => true,
                };
                if !discarded {
                    return (Settled::Stale, self.outcome(false, 0));
                }
                if let Some(parent_id) = parent_id {
                    self.decrement_replies(parent_id);
                }
                (Settled::RolledBack, self.outcome(true, -1))
            }
        }
    }

    /// Create a comment or reply. The outcome covers the whole action.
    pub async fn create<A: CommentApi>(
        &mut self,
        api: &A,
        draft: &CommentDraft,
    ) -> (Settled, CommentOutcome) {
        let Some((pending, begun)) = self.begin_create(draft) else {
            return (Settled::Stale, self.outcome(false, 0));
        };
        let result = api.create_comment(&self.post_id, draft).await;
        let (settled, outcome) = self.settle_create(&pending, result);
        (settled, begun.followed_by(outcome))
    }

    /// Hide a comment (and, for a top-level one, its replies) before the
    /// delete request completes.
    pub fn begin_delete(&mut self, comment_id: &str) -> Option<(PendingDelete, CommentOutcome)> {
        let pending = match self.locate(comment_id)? {
            Location::TopLevel => PendingDelete {
                removed: self.comments.remove_entity(comment_id)?,
                parent_id: None,
                replies: self.replies.remove(comment_id),
            },
            Location::Reply { parent_id } => {
                let removed = self.replies.get_mut(&parent_id)?.remove_entity(comment_id)?;
                self.decrement_replies(&parent_id);
                PendingDelete {
                    removed,
                    parent_id: Some(parent_id),
                    replies: None,
                }
            }
        };
        Some((pending, self.outcome(true, -1)))
    }

    /// Confirm or roll back a delete. The outcome is relative to the state
    /// left by `begin_delete`.
    pub fn settle_delete(
        &mut self,
        pending: PendingDelete,
        result: ClientResult<()>,
    ) -> (Settled, CommentOutcome) {
        let Err(e) = result else {
            return (Settled::Confirmed, self.outcome(false, 0));
        };
        tracing::warn!(
            "Deleting comment {} failed, restoring: {}",
            pending.removed.entity().id,
            e
        );

        let id = pending.removed.entity().id.clone();
        let restored = match &pending.parent_id {
            None => {
                let restored = self.comments.restore(pending.removed);
                if let (true, Some(replies)) = (restored, pending.replies) {
                    self.replies.insert(id, replies);
                }
                restored
            }
            Some(parent_id) => {
                let restored = match self.replies.get_mut(parent_id) {
                    Some(list) => list.restore(pending.removed),
                    None => false,
                };
                if restored {
                    self.comments.apply_entity_replace(parent_id, |parent| {
                        parent.replies_count = parent.replies_count.saturating_add(1)
                    });
                }
                restored
            }
        };

        if restored {
            (Settled::RolledBack, self.outcome(true, 1))
        } else {
            (Settled::Stale, self.outcome(false, 0))
        }
    }

    /// Delete a comment or reply. The outcome covers the whole action.
    pub async fn delete<A: CommentApi>(
        &mut self,
        api: &A,
        comment_id: &str,
    ) -> (Settled, CommentOutcome) {
        let Some((pending, begun)) = self.begin_delete(comment_id) else {
            return (Settled::Stale, self.outcome(false, 0));
        };
        let result = api.delete_comment(comment_id).await;
        let (settled, outcome) = self.settle_delete(pending, result);
        (settled, begun.followed_by(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ClientError;
    use crate::realtime::{CommentDeleteEvent, CommentLikeEvent};
    use crate::sync::test_support::{comment, viewer, FakeApi};

    fn sync_with(comments: Vec<Comment>) -> CommentSync {
        let mut sync = CommentSync::new("p1", viewer());
        sync.comments = ReconcileList::from_server(comments);
        sync
    }

    async fn expanded(api: &FakeApi) -> CommentSync {
        let mut sync = sync_with(vec![comment("c1", "p1", None, "u2", 0)]);
        sync.comments
            .apply_entity_replace("c1", |c| c.replies_count = 1);
        api.set_replies("c1", vec![comment("r1", "p1", Some("c1"), "u3", 1)]);
        sync.toggle_replies(api, "c1").await;
        sync
    }

    #[test]
    fn test_reply_counter_without_population() {
        let mut sync = sync_with(vec![comment("c1", "p1", None, "u2", 0)]);

        let outcome = sync.handle_event(&ServerEvent::CommentReply(comment(
            "r1",
            "p1",
            Some("c1"),
            "u3",
            5,
        )));

        assert!(outcome.changed);
        assert_eq!(outcome.comment_delta, 1);
        assert_eq!(sync.comment("c1").unwrap().replies_count, 1);
        assert!(sync.replies("c1").is_none());
        assert!(!sync.comment("c1").unwrap().replies_expanded);
    }

    #[tokio::test]
    async fn test_expand_fetches_once_and_collapse_keeps_cache() {
        let api = FakeApi::default();
        let mut sync = expanded(&api).await;
        assert!(sync.comment("c1").unwrap().replies_expanded);
        assert_eq!(sync.replies("c1").unwrap().len(), 1);

        sync.toggle_replies(&api, "c1").await;
        assert!(!sync.comment("c1").unwrap().replies_expanded);
        assert!(sync.replies("c1").is_some());

        sync.toggle_replies(&api, "c1").await;
        assert_eq!(api.reply_fetches(), 1);
    }

    #[tokio::test]
    async fn test_reply_event_populates_loaded_list() {
        let api = FakeApi::default();
        let mut sync = expanded(&api).await;

        sync.handle_event(&ServerEvent::CommentReply(comment("r2", "p1", Some("c1"), "u4", 9)));
        let ids: Vec<&str> = sync.replies("c1").unwrap().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2"]);
        assert_eq!(sync.comment("c1").unwrap().replies_count, 2);
    }

    #[tokio::test]
    async fn test_like_on_reply_found_by_scan() {
        let api = FakeApi::default();
        let mut sync = expanded(&api).await;

        let outcome = sync.handle_event(&ServerEvent::CommentLike(CommentLikeEvent {
            comment_id: "r1".to_string(),
            post_id: "p1".to_string(),
            user_id: "u9".to_string(),
            liked: true,
        }));
        assert!(outcome.changed);
        assert_eq!(sync.comment("r1").unwrap().likes_count, 1);
        assert!(!sync.comment("r1").unwrap().is_liked_by_viewer);
    }

    #[tokio::test]
    async fn test_delete_top_level_discards_replies() {
        let api = FakeApi::default();
        let mut sync = expanded(&api).await;

        let outcome = sync.handle_event(&ServerEvent::CommentDelete(CommentDeleteEvent {
            comment_id: "c1".to_string(),
            post_id: "p1".to_string(),
            parent_id: None,
            user_id: Some("u2".to_string()),
            comments_count: None,
        }));

        assert_eq!(outcome.comment_delta, -1);
        assert!(sync.comment("c1").is_none());
        assert!(sync.replies("c1").is_none());
        assert!(sync.comment("r1").is_none());
    }

    #[test]
    fn test_delete_unloaded_reply_decrements_counter() {
        let mut parent = comment("c1", "p1", None, "u2", 0);
        parent.replies_count = 3;
        let mut sync = sync_with(vec![parent]);

        sync.handle_event(&ServerEvent::CommentDelete(CommentDeleteEvent {
            comment_id: "r7".to_string(),
            post_id: "p1".to_string(),
            parent_id: Some("c1".to_string()),
            user_id: Some("u3".to_string()),
            comments_count: None,
        }));
        assert_eq!(sync.comment("c1").unwrap().replies_count, 2);
    }

    #[test]
    fn test_own_comment_echo_is_not_counted_twice() {
        let mut sync = sync_with(vec![]);
        let draft = CommentDraft {
            content: "so pretty".to_string(),
            parent_id: None,
        };
        let (pending, created) = sync.begin_create(&draft).unwrap();
        assert_eq!(created.comment_delta, 1);

        let echo = sync.handle_event(&ServerEvent::CommentNew(comment("c9", "p1", None, "me", 1)));
        assert_eq!(echo.comment_delta, 0);

        let (settled, _) = sync.settle_create(&pending, Ok(comment("c9", "p1", None, "me", 1)));
        assert_eq!(settled, Settled::Confirmed);
        assert_eq!(sync.comments().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_reply_rolls_back_counter() {
        let api = FakeApi::failing();
        let mut sync = sync_with(vec![comment("c1", "p1", None, "u2", 0)]);
        let draft = CommentDraft {
            content: "me too".to_string(),
            parent_id: Some("c1".to_string()),
        };

        let (settled, outcome) = sync.create(&api, &draft).await;
        assert_eq!(settled, Settled::RolledBack);
        assert_eq!(outcome.comment_delta, 0);
        assert_eq!(sync.comment("c1").unwrap().replies_count, 0);
        assert!(sync.replies("c1").is_none());
    }

    #[test]
    fn test_reply_echo_after_confirm_is_not_counted_twice() {
        let mut sync = sync_with(vec![comment("c1", "p1", None, "u2", 0)]);
        let draft = CommentDraft {
            content: "me too".to_string(),
            parent_id: Some("c1".to_string()),
        };
        let (pending, begun) = sync.begin_create(&draft).unwrap();
        assert_eq!(begun.comment_delta, 1);
        assert_eq!(pending.key, None);

        let reply = comment("r1", "p1", Some("c1"), "me", 1);
        let (settled, confirmed) = sync.settle_create(&pending, Ok(reply.clone()));
        assert_eq!(settled, Settled::Confirmed);
        assert_eq!(confirmed.comment_delta, 0);

        let echo = sync.handle_event(&ServerEvent::CommentReply(reply));
        assert_eq!(echo.comment_delta, 0);
        assert_eq!(sync.comment("c1").unwrap().replies_count, 1);
    }

    #[test]
    fn test_own_comment_from_another_session_is_counted() {
        let mut sync = sync_with(vec![comment("c1", "p1", None, "u2", 0)]);

        let top = sync.handle_event(&ServerEvent::CommentNew(comment("c2", "p1", None, "me", 1)));
        assert_eq!(top.comment_delta, 1);
        let reply =
            sync.handle_event(&ServerEvent::CommentReply(comment("r1", "p1", Some("c1"), "me", 2)));
        assert_eq!(reply.comment_delta, 1);
        assert_eq!(sync.comment("c1").unwrap().replies_count, 1);
    }

    #[tokio::test]
    async fn test_create_and_delete_report_net_change() {
        let api = FakeApi::default();
        let mut sync = sync_with(vec![comment("k1", "p1", None, "u2", 0)]);
        let draft = CommentDraft {
            content: "so pretty".to_string(),
            parent_id: None,
        };

        let (settled, created) = sync.create(&api, &draft).await;
        assert_eq!(settled, Settled::Confirmed);
        assert_eq!(created.comment_delta, 1);

        api.fail_all(true);
        let (settled, kept) = sync.delete(&api, "k1").await;
        assert_eq!(settled, Settled::RolledBack);
        assert_eq!(kept.comment_delta, 0);

        api.fail_all(false);
        let (settled, deleted) = sync.delete(&api, "k1").await;
        assert_eq!(settled, Settled::Confirmed);
        assert_eq!(deleted.comment_delta, -1);
    }

    #[tokio::test]
    async fn test_failed_delete_restores_comment_and_replies() {
        let api = FakeApi::default();
        let mut sync = expanded(&api).await;

        let (pending, _) = sync.begin_delete("c1").unwrap();
        assert!(sync.comment("c1").is_none());

        let (settled, outcome) =
            sync.settle_delete(pending, Err(ClientError::Transport("offline".to_string())));
        assert_eq!(settled, Settled::RolledBack);
        assert_eq!(outcome.comment_delta, 1);
        assert!(sync.comment("c1").is_some());
        assert!(sync.comment("r1").is_some());
    }

    #[test]
    fn test_events_for_other_posts_are_ignored() {
        let mut sync = sync_with(vec![]);
        let outcome = sync.handle_event(&ServerEvent::CommentNew(comment("c1", "p2", None, "u2", 0)));
        assert!(!outcome.changed);
        assert!(sync.comments().is_empty());
    }
}
