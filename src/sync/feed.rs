//! Feed reconciliation: posts, their like state, and the open detail view.

use std::collections::HashMap;

use chrono::Utc;

use super::comments::{CommentOutcome, CommentSync};
use super::engine::{
    Direction, EntityKey, LikeTicket, Position, ReconcileList, RemoteLike, Removed, Settled,
};
use super::ranking;
use crate::api::{or_empty, CommentApi, FeedApi};
use crate::errors::ClientResult;
use crate::models::{CommentDraft, Post, PostDraft, PostStatus};
use crate::realtime::{EventKind, ServerEvent};
use crate::session::ViewerContext;

/// A post creation waiting on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPost {
    pub key: EntityKey,
}

/// Reconciled post list for one mounted feed view.
pub struct FeedSync {
    viewer: ViewerContext,
    posts: ReconcileList<Post>,
    /// Post shown in the detail dialog, if any.
    active_post: Option<String>,
    /// Comment state per post, populated when a detail view opens.
    comments: HashMap<String, CommentSync>,
    page: u32,
    total_pages: u32,
}

impl FeedSync {
    /// Events the feed view subscribes to.
    pub const EVENTS: &'static [EventKind] = &[
        EventKind::PostLiked,
        EventKind::PostUnliked,
        EventKind::PostUpdated,
        EventKind::PostDeleted,
        EventKind::NewPost,
        EventKind::CommentNew,
        EventKind::CommentReply,
        EventKind::CommentLike,
        EventKind::CommentDelete,
        EventKind::CommentUpdate,
    ];

    pub fn new(viewer: ViewerContext) -> Self {
        Self {
            viewer,
            posts: ReconcileList::new(),
            active_post: None,
            comments: HashMap::new(),
            page: 0,
            total_pages: 0,
        }
    }

    pub fn viewer(&self) -> &ViewerContext {
        &self.viewer
    }

    pub fn posts(&self) -> &ReconcileList<Post> {
        &self.posts
    }

    pub fn post(&self, id: &str) -> Option<&Post> {
        self.posts.get(id)
    }

    pub fn active_post(&self) -> Option<&str> {
        self.active_post.as_deref()
    }

    pub fn has_more(&self) -> bool {
        self.page < self.total_pages
    }

    /// Posts ranked for the featured strip.
    pub fn featured(&self, limit: usize) -> Vec<&Post> {
        ranking::top_featured(self.posts.iter(), limit)
    }

    /// Load the first page, replacing the current list. Failures leave an
    /// empty feed.
    pub async fn load<A: FeedApi>(&mut self, api: &A, limit: u32) {
        let page = or_empty(api.list_posts(1, limit).await, "feed");
        self.posts = ReconcileList::from_server(page.items);
        self.posts.sort_by(ranking::newest_first);
        self.page = page.page;
        self.total_pages = page.total_pages;
    }

    /// Append the next page. Failures keep what is already shown.
    pub async fn load_more<A: FeedApi>(&mut self, api: &A, limit: u32) {
        if !self.has_more() {
            return;
        }
        let next = self.page + 1;
        match api.list_posts(next, limit).await {
            Ok(page) => {
                self.posts.extend_tail(page.items);
                self.page = page.page;
                self.total_pages = page.total_pages;
            }
            Err(e) => tracing::warn!("Failed to load feed page {}: {}", next, e),
        }
    }

    /// Apply one push event. Returns whether visible state changed.
    pub fn handle_event(&mut self, event: &ServerEvent) -> bool {
        match event {
            ServerEvent::PostLiked(like) | ServerEvent::PostUnliked(like) => {
                let direction = Direction::from_liked(matches!(event, ServerEvent::PostLiked(_)));
                let is_self = self.viewer.is_self(&like.user_id);
                self.posts.apply_remote_like(&like.post_id, direction, is_self) == RemoteLike::Applied
            }
            ServerEvent::PostUpdated(patch) => {
                let patch = patch.clone();
                let id = patch.id.clone();
                let changed = self
                    .posts
                    .apply_entity_replace(&id, |post| post.apply_patch(patch));
                if self.posts.get(&id).is_some_and(|post| !self.is_visible(post)) {
                    return self.remove_post(&id);
                }
                changed
            }
            ServerEvent::PostDeleted(deleted) => self.remove_post(&deleted.post_id),
            ServerEvent::NewPost(post) => {
                self.is_visible(post) && self.posts.insert_if_absent(post.clone(), Position::Head)
            }
            // Without comment state for the post, no optimistic create or
            // delete was made here, so every event counts.
            ServerEvent::CommentNew(comment) | ServerEvent::CommentReply(comment) => {
                let post_id = comment.post_id.clone();
                match self.comments.get_mut(&post_id) {
                    Some(sync) => {
                        let outcome = sync.handle_event(event);
                        self.apply_comment_outcome(&outcome)
                    }
                    None => self.adjust_comment_count(&post_id, 1),
                }
            }
            ServerEvent::CommentLike(like) => match self.comments.get_mut(&like.post_id) {
                Some(sync) => sync.handle_event(event).changed,
                None => false,
            },
            ServerEvent::CommentUpdate(_) => self
                .comments
                .values_mut()
                .any(|sync| sync.handle_event(event).changed),
            ServerEvent::CommentDelete(deleted) => {
                let outcome = match self.comments.get_mut(&deleted.post_id) {
                    Some(sync) => sync.handle_event(event),
                    None => CommentOutcome {
                        post_id: deleted.post_id.clone(),
                        changed: false,
                        comment_delta: -1,
                    },
                };
                match deleted.comments_count {
                    Some(count) => {
                        let changed = self.posts.apply_entity_replace(&deleted.post_id, |post| {
                            post.comments_count = count
                        });
                        changed || outcome.changed
                    }
                    None => self.apply_comment_outcome(&outcome) || outcome.changed,
                }
            }
            _ => false,
        }
    }

    /// Private posts are only shown to their author.
    fn is_visible(&self, post: &Post) -> bool {
        post.status == PostStatus::Published || self.viewer.is_self(&post.author.id)
    }

    /// Remove a post and everything hanging off it: its comment cache and the
    /// detail view if it shows this post.
    fn remove_post(&mut self, post_id: &str) -> bool {
        let removed = self.posts.remove_entity(post_id).is_some();
        let dropped_comments = self.comments.remove(post_id).is_some();
        let was_active = self.active_post.as_deref() == Some(post_id);
        if was_active {
            self.active_post = None;
        }
        removed || dropped_comments || was_active
    }

    /// Apply the post-counter side effect of a comment change.
    pub fn apply_comment_outcome(&mut self, outcome: &CommentOutcome) -> bool {
        if outcome.comment_delta == 0 {
            return outcome.changed;
        }
        self.adjust_comment_count(&outcome.post_id, outcome.comment_delta) || outcome.changed
    }

    fn adjust_comment_count(&mut self, post_id: &str, delta: i32) -> bool {
        self.posts.apply_entity_replace(post_id, |post| {
            post.comments_count = post.comments_count.saturating_add_signed(delta);
        })
    }

    /// Optimistically flip the viewer's like.
    pub fn begin_like(&mut self, post_id: &str) -> Option<LikeTicket> {
        self.posts.begin_like_toggle(post_id)
    }

    /// Finish an optimistic like with the request's outcome.
    pub fn settle_like(&mut self, ticket: &LikeTicket, result: ClientResult<()>) -> Settled {
        if let Err(e) = &result {
            tracing::warn!("Like on post {} failed, rolling back: {}", ticket.entity_id, e);
        }
        self.posts.settle_like(ticket, result.is_ok())
    }

    /// Like or unlike a post, rolling back on failure.
    pub async fn toggle_like<A: FeedApi>(&mut self, api: &A, post_id: &str) -> Settled {
        let Some(ticket) = self.begin_like(post_id) else {
            return Settled::Stale;
        };
        let result = match ticket.direction {
            Direction::Up => api.like_post(post_id).await,
            Direction::Down => api.unlike_post(post_id).await,
        };
        self.settle_like(&ticket, result)
    }

    /// Show a post created by the viewer before the server confirms it.
    pub fn begin_create(&mut self, draft: &PostDraft) -> PendingPost {
        let post = draft.to_optimistic(self.viewer.user.clone(), Utc::now());
        PendingPost {
            key: self.posts.insert_local(post, Position::Head),
        }
    }

    pub fn settle_create(&mut self, pending: &PendingPost, result: ClientResult<Post>) -> Settled {
        match result {
            Ok(post) => self.posts.confirm_local(&pending.key, post),
            Err(e) => {
                tracing::warn!("Creating post failed, removing optimistic copy: {}", e);
                match self.posts.discard_local(&pending.key) {
                    Some(_) => Settled::RolledBack,
                    None => Settled::Stale,
                }
            }
        }
    }

    pub async fn create_post<A: FeedApi>(&mut self, api: &A, draft: &PostDraft) -> Settled {
        let pending = self.begin_create(draft);
        let result = api.create_post(draft).await;
        self.settle_create(&pending, result)
    }

    /// Hide a post before the delete request completes.
    pub fn begin_delete(&mut self, post_id: &str) -> Option<Removed<Post>> {
        let removed = self.posts.remove_entity(post_id)?;
        if self.active_post.as_deref() == Some(post_id) {
            self.active_post = None;
        }
        Some(removed)
    }

    pub fn settle_delete(&mut self, removed: Removed<Post>, result: ClientResult<()>) -> Settled {
        match result {
            Ok(()) => {
                self.comments.remove(removed.entity().id.as_str());
                Settled::Confirmed
            }
            Err(e) => {
                tracing::warn!("Deleting post {} failed, restoring: {}", removed.entity().id, e);
                if self.posts.restore(removed) {
                    Settled::RolledBack
                } else {
                    Settled::Stale
                }
            }
        }
    }

    pub async fn delete_post<A: FeedApi>(&mut self, api: &A, post_id: &str) -> Settled {
        let Some(removed) = self.begin_delete(post_id) else {
            return Settled::Stale;
        };
        let result = api.delete_post(post_id).await;
        self.settle_delete(removed, result)
    }

    /// Focus a post in the detail view. Returns its comment state, created on
    /// first open. Callers join the post's room for as long as it is open.
    pub fn open_detail(&mut self, post_id: &str) -> Option<&mut CommentSync> {
        if !self.posts.contains(post_id) {
            return None;
        }
        self.active_post = Some(post_id.to_string());
        let viewer = self.viewer.clone();
        Some(
            self.comments
                .entry(post_id.to_string())
                .or_insert_with(|| CommentSync::new(post_id, viewer)),
        )
    }

    /// Comment on a post whose detail state is open, keeping the post's
    /// counter in step.
    pub async fn create_comment<A: CommentApi>(
        &mut self,
        api: &A,
        post_id: &str,
        draft: &CommentDraft,
    ) -> Settled {
        let Some(sync) = self.comments.get_mut(post_id) else {
            return Settled::Stale;
        };
        let (settled, outcome) = sync.create(api, draft).await;
        self.apply_comment_outcome(&outcome);
        settled
    }

    pub async fn delete_comment<A: CommentApi>(
        &mut self,
        api: &A,
        post_id: &str,
        comment_id: &str,
    ) -> Settled {
        let Some(sync) = self.comments.get_mut(post_id) else {
            return Settled::Stale;
        };
        let (settled, outcome) = sync.delete(api, comment_id).await;
        self.apply_comment_outcome(&outcome);
        settled
    }

    pub fn close_detail(&mut self) {
        self.active_post = None;
    }

    pub fn comments_for(&self, post_id: &str) -> Option<&CommentSync> {
        self.comments.get(post_id)
    }

    pub fn comments_for_mut(&mut self, post_id: &str) -> Option<&mut CommentSync> {
        self.comments.get_mut(post_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostPatch;
    use crate::realtime::{PostDeletedEvent, PostLikeEvent};
    use crate::sync::engine::SyncState;
    use crate::sync::test_support::{comment, post, viewer, FakeApi};

    fn feed_with(posts: Vec<Post>) -> FeedSync {
        let mut feed = FeedSync::new(viewer());
        feed.posts = ReconcileList::from_server(posts);
        feed
    }

    fn liked(post_id: &str, user_id: &str) -> ServerEvent {
        ServerEvent::PostLiked(PostLikeEvent {
            post_id: post_id.to_string(),
            user_id: user_id.to_string(),
            likes_count: None,
        })
    }

    #[tokio::test]
    async fn test_self_echo_does_not_double_count() {
        let mut feed = feed_with(vec![post("p1", "u2", 0)]);
        let ticket = feed.begin_like("p1").unwrap();
        assert_eq!(feed.post("p1").unwrap().likes_count, 1);

        assert!(!feed.handle_event(&liked("p1", "me")));
        assert_eq!(feed.settle_like(&ticket, Ok(())), Settled::Confirmed);

        let p = feed.post("p1").unwrap();
        assert_eq!(p.likes_count, 1);
        assert!(p.is_liked_by_viewer);
    }

    #[test]
    fn test_other_actor_like_is_additive_only() {
        for prior in [false, true] {
            let mut p = post("p1", "u2", 0);
            p.likes_count = 7;
            p.is_liked_by_viewer = prior;
            let mut feed = feed_with(vec![p]);

            assert!(feed.handle_event(&liked("p1", "u3")));
            let p = feed.post("p1").unwrap();
            assert_eq!(p.likes_count, 8);
            assert_eq!(p.is_liked_by_viewer, prior);
        }
    }

    #[tokio::test]
    async fn test_failed_unlike_rolls_back() {
        let mut p = post("p1", "u2", 0);
        p.likes_count = 5;
        p.is_liked_by_viewer = true;
        let mut feed = feed_with(vec![p]);
        let api = FakeApi::failing();

        assert_eq!(feed.toggle_like(&api, "p1").await, Settled::RolledBack);
        let p = feed.post("p1").unwrap();
        assert_eq!(p.likes_count, 5);
        assert!(p.is_liked_by_viewer);
        assert_eq!(feed.posts().state("p1"), Some(SyncState::RolledBack));
    }

    #[test]
    fn test_created_post_and_echo_render_once() {
        let mut feed = feed_with(vec![post("p1", "u2", 0)]);
        let draft = PostDraft {
            content: "new look".to_string(),
            ..PostDraft::default()
        };
        let pending = feed.begin_create(&draft);
        assert_eq!(feed.posts().len(), 2);

        let mut confirmed = post("p9", "me", 10);
        confirmed.content = "new look".to_string();
        feed.settle_create(&pending, Ok(confirmed.clone()));
        assert!(!feed.handle_event(&ServerEvent::NewPost(confirmed)));

        assert_eq!(feed.posts().iter().filter(|p| p.id == "p9").count(), 1);
        assert_eq!(feed.posts().len(), 2);
    }

    #[test]
    fn test_echo_before_confirmation_still_renders_once() {
        let mut feed = feed_with(vec![]);
        let pending = feed.begin_create(&PostDraft::default());
        let confirmed = post("p9", "me", 10);

        feed.handle_event(&ServerEvent::NewPost(confirmed.clone()));
        feed.settle_create(&pending, Ok(confirmed));

        assert_eq!(feed.posts().len(), 1);
        assert!(feed.post("p9").is_some());
    }

    #[test]
    fn test_failed_create_removes_optimistic_row() {
        let mut feed = feed_with(vec![]);
        let pending = feed.begin_create(&PostDraft::default());
        let settled = feed.settle_create(
            &pending,
            Err(crate::errors::ClientError::Transport("offline".to_string())),
        );
        assert_eq!(settled, Settled::RolledBack);
        assert!(feed.posts().is_empty());
    }

    #[test]
    fn test_private_post_from_other_is_not_inserted() {
        let mut feed = feed_with(vec![]);
        let mut p = post("p1", "u2", 0);
        p.status = PostStatus::Private;
        assert!(!feed.handle_event(&ServerEvent::NewPost(p)));
        assert!(feed.posts().is_empty());
    }

    #[tokio::test]
    async fn test_post_deleted_cascades() {
        let mut feed = feed_with(vec![post("p1", "u2", 0), post("p2", "u2", 1)]);
        let api = FakeApi::default();
        api.set_comments(
            "p1",
            vec![comment("c1", "p1", None, "u3", 0), comment("c2", "p1", None, "u4", 1)],
        );
        api.set_replies("c1", vec![comment("r1", "p1", Some("c1"), "u5", 2)]);
        api.set_replies("c2", vec![comment("r2", "p1", Some("c2"), "u5", 3)]);

        let detail = feed.open_detail("p1").unwrap();
        detail.load(&api).await;
        detail.toggle_replies(&api, "c1").await;
        detail.toggle_replies(&api, "c2").await;
        assert_eq!(feed.active_post(), Some("p1"));

        let changed = feed.handle_event(&ServerEvent::PostDeleted(PostDeletedEvent {
            post_id: "p1".to_string(),
            user_id: Some("u2".to_string()),
        }));

        assert!(changed);
        assert!(feed.post("p1").is_none());
        assert_eq!(feed.active_post(), None);
        assert!(feed.comments_for("p1").is_none());
        assert!(feed.post("p2").is_some());
    }

    #[test]
    fn test_comment_events_without_detail_bump_post_counter() {
        let mut feed = feed_with(vec![post("p1", "u2", 0)]);
        let event = ServerEvent::CommentNew(comment("c1", "p1", None, "u3", 5));
        assert!(feed.handle_event(&event));
        assert_eq!(feed.post("p1").unwrap().comments_count, 1);

        // Posted by the viewer from another session.
        let own = ServerEvent::CommentNew(comment("c2", "p1", None, "me", 6));
        assert!(feed.handle_event(&own));
        assert_eq!(feed.post("p1").unwrap().comments_count, 2);
    }

    fn post_with_comments(count: u32) -> FeedSync {
        let mut p = post("p1", "u2", 0);
        p.comments_count = count;
        let mut feed = feed_with(vec![p]);
        feed.open_detail("p1");
        feed
    }

    fn draft() -> CommentDraft {
        CommentDraft {
            content: "so pretty".to_string(),
            parent_id: None,
        }
    }

    #[tokio::test]
    async fn test_failed_comment_leaves_post_counter() {
        let mut feed = post_with_comments(3);

        let settled = feed.create_comment(&FakeApi::failing(), "p1", &draft()).await;
        assert_eq!(settled, Settled::RolledBack);
        assert_eq!(feed.post("p1").unwrap().comments_count, 3);
    }

    #[tokio::test]
    async fn test_comment_and_its_echo_count_once() {
        let api = FakeApi::default();
        let mut feed = post_with_comments(3);

        assert_eq!(feed.create_comment(&api, "p1", &draft()).await, Settled::Confirmed);
        assert_eq!(feed.post("p1").unwrap().comments_count, 4);

        let created = feed.comments_for("p1").unwrap().comments().iter().next().cloned().unwrap();
        feed.handle_event(&ServerEvent::CommentNew(created));
        assert_eq!(feed.post("p1").unwrap().comments_count, 4);
        assert_eq!(feed.comments_for("p1").unwrap().comments().len(), 1);
    }

    #[tokio::test]
    async fn test_comment_delete_moves_post_counter_once() {
        let api = FakeApi::default();
        api.set_comments("p1", vec![comment("k1", "p1", None, "me", 0)]);
        let mut feed = post_with_comments(1);
        feed.comments_for_mut("p1").unwrap().load(&api).await;

        api.fail_all(true);
        assert_eq!(feed.delete_comment(&api, "p1", "k1").await, Settled::RolledBack);
        assert_eq!(feed.post("p1").unwrap().comments_count, 1);

        api.fail_all(false);
        assert_eq!(feed.delete_comment(&api, "p1", "k1").await, Settled::Confirmed);
        assert_eq!(feed.post("p1").unwrap().comments_count, 0);
    }

    #[test]
    fn test_post_made_private_by_other_author_leaves_feed() {
        let mut feed = feed_with(vec![post("p1", "u2", 0), post("p2", "me", 1)]);
        for id in ["p1", "p2"] {
            feed.handle_event(&ServerEvent::PostUpdated(PostPatch {
                id: id.to_string(),
                status: Some(PostStatus::Private),
                ..PostPatch::default()
            }));
        }
        assert!(feed.post("p1").is_none());
        assert_eq!(feed.post("p2").unwrap().status, PostStatus::Private);
    }

    #[tokio::test]
    async fn test_load_more_appends_without_duplicates() {
        let api = FakeApi::default();
        api.set_posts(vec![post("p1", "u2", 30), post("p2", "u2", 20), post("p3", "u2", 10)]);
        let mut feed = FeedSync::new(viewer());

        feed.load(&api, 2).await;
        assert!(feed.has_more());
        feed.handle_event(&ServerEvent::NewPost(post("p3", "u2", 10)));

        feed.load_more(&api, 2).await;
        let ids: Vec<&str> = feed.posts().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p3", "p1", "p2"]);
        assert!(!feed.has_more());
    }

    #[tokio::test]
    async fn test_failed_load_leaves_empty_feed() {
        let mut feed = feed_with(vec![post("p1", "u2", 0)]);
        feed.load(&FakeApi::failing(), 10).await;
        assert!(feed.posts().is_empty());
        assert!(!feed.has_more());
    }

    #[tokio::test]
    async fn test_failed_delete_restores_post() {
        let mut feed = feed_with(vec![post("p1", "me", 0), post("p2", "u2", 1)]);
        assert_eq!(
            feed.delete_post(&FakeApi::failing(), "p1").await,
            Settled::RolledBack
        );
        let ids: Vec<&str> = feed.posts().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }
}
