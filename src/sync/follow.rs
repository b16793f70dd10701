//! Follow-state tracking for the viewer.

use std::collections::HashMap;

use super::engine::Settled;
use crate::api::{or_empty, FollowApi};
use crate::errors::ClientResult;
use crate::models::{FollowCounts, UserId};
use crate::realtime::{EventKind, FollowEvent, ServerEvent};
use crate::session::ViewerContext;

/// An optimistic follow toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowTicket {
    pub user_id: UserId,
    pub was_following: bool,
}

/// Which users the viewer follows, plus the viewer's own counts.
///
/// The counts are never adjusted locally. Any follow event touching the
/// viewer marks them stale and `refresh_counts` refetches them.
pub struct FollowTracker {
    viewer: ViewerContext,
    following: HashMap<UserId, bool>,
    counts: Option<FollowCounts>,
    counts_stale: bool,
}

impl FollowTracker {
    pub const EVENTS: &'static [EventKind] = &[EventKind::UserFollowed, EventKind::UserUnfollowed];

    pub fn new(viewer: ViewerContext) -> Self {
        Self {
            viewer,
            following: HashMap::new(),
            counts: None,
            counts_stale: true,
        }
    }

    /// Seed the map from the bulk "who do I follow" read.
    pub async fn seed<A: FollowApi>(&mut self, api: &A) {
        let ids = or_empty(api.following_ids().await, "following list");
        self.following = ids.into_iter().map(|id| (id, true)).collect();
    }

    pub fn is_following(&self, user_id: &str) -> bool {
        self.following.get(user_id).copied().unwrap_or(false)
    }

    pub fn following_count(&self) -> usize {
        self.following.values().filter(|f| **f).count()
    }

    pub fn counts(&self) -> Option<FollowCounts> {
        self.counts
    }

    pub fn counts_stale(&self) -> bool {
        self.counts_stale
    }

    pub fn invalidate_counts(&mut self) {
        self.counts_stale = true;
    }

    /// Refetch the viewer's counts if they were invalidated. A failed read
    /// keeps the previous value and leaves the counts stale.
    pub async fn refresh_counts<A: FollowApi>(&mut self, api: &A) -> Option<FollowCounts> {
        if !self.counts_stale {
            return self.counts;
        }
        match api.follow_counts(self.viewer.id()).await {
            Ok(counts) => {
                self.counts = Some(counts);
                self.counts_stale = false;
            }
            Err(e) => tracing::warn!("Failed to refresh follow counts: {}", e),
        }
        self.counts
    }

    /// Apply a follow push event. Events between two other users are ignored.
    pub fn handle_event(&mut self, event: &ServerEvent) -> bool {
        let (follow, now_following) = match event {
            ServerEvent::UserFollowed(follow) => (follow, true),
            ServerEvent::UserUnfollowed(follow) => (follow, false),
            _ => return false,
        };
        if !self.touches_viewer(follow) {
            return false;
        }

        self.counts_stale = true;
        if self.viewer.is_self(&follow.follower_id) {
            let previous = self.following.insert(follow.following_id.clone(), now_following);
            if previous == Some(now_following) {
                tracing::debug!("Follow echo for {} already applied", follow.following_id);
            }
        }
        true
    }

    fn touches_viewer(&self, follow: &FollowEvent) -> bool {
        self.viewer.is_self(&follow.follower_id) || self.viewer.is_self(&follow.following_id)
    }

    pub fn begin_toggle(&mut self, user_id: &str) -> Option<FollowTicket> {
        if user_id.is_empty() || self.viewer.is_self(user_id) {
            return None;
        }
        let was_following = self.is_following(user_id);
        self.following.insert(user_id.to_string(), !was_following);
        Some(FollowTicket {
            user_id: user_id.to_string(),
            was_following,
        })
    }

    pub fn settle_toggle(&mut self, ticket: &FollowTicket, result: ClientResult<()>) -> Settled {
        match result {
            Ok(()) => {
                self.counts_stale = true;
                Settled::Confirmed
            }
            Err(e) => {
                tracing::warn!("Follow toggle on {} failed, rolling back: {}", ticket.user_id, e);
                self.following
                    .insert(ticket.user_id.clone(), ticket.was_following);
                Settled::RolledBack
            }
        }
    }

    pub async fn toggle<A: FollowApi>(&mut self, api: &A, user_id: &str) -> Settled {
        let Some(ticket) = self.begin_toggle(user_id) else {
            return Settled::Stale;
        };
        let result = if ticket.was_following {
            api.unfollow(user_id).await
        } else {
            api.follow(user_id).await
        };
        self.settle_toggle(&ticket, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::test_support::{viewer, FakeApi};

    fn followed(follower: &str, following: &str) -> ServerEvent {
        ServerEvent::UserFollowed(FollowEvent {
            follower_id: follower.to_string(),
            following_id: following.to_string(),
        })
    }

    #[tokio::test]
    async fn test_seed_and_toggle() {
        let api = FakeApi::default();
        api.set_following(vec!["u2".to_string()]);
        let mut tracker = FollowTracker::new(viewer());
        tracker.seed(&api).await;
        assert!(tracker.is_following("u2"));

        assert_eq!(tracker.toggle(&api, "u3").await, Settled::Confirmed);
        assert!(tracker.is_following("u3"));
        assert_eq!(tracker.following_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_toggle_rolls_back() {
        let api = FakeApi::failing();
        let mut tracker = FollowTracker::new(viewer());

        assert_eq!(tracker.toggle(&api, "u3").await, Settled::RolledBack);
        assert!(!tracker.is_following("u3"));
    }

    #[test]
    fn test_cannot_follow_self() {
        let mut tracker = FollowTracker::new(viewer());
        assert!(tracker.begin_toggle("me").is_none());
    }

    #[test]
    fn test_events_between_others_are_ignored() {
        let mut tracker = FollowTracker::new(viewer());
        tracker.counts_stale = false;

        assert!(!tracker.handle_event(&followed("u2", "u3")));
        assert!(!tracker.is_following("u3"));
        assert!(!tracker.counts_stale());
    }

    #[test]
    fn test_viewer_events_update_map_and_invalidate_counts() {
        let mut tracker = FollowTracker::new(viewer());
        tracker.counts_stale = false;

        assert!(tracker.handle_event(&followed("me", "u3")));
        assert!(tracker.is_following("u3"));
        assert!(tracker.counts_stale());

        tracker.counts_stale = false;
        assert!(tracker.handle_event(&followed("u4", "me")));
        assert!(!tracker.is_following("u4"));
        assert!(tracker.counts_stale());
    }

    #[tokio::test]
    async fn test_counts_refetched_only_when_stale() {
        let api = FakeApi::default();
        api.set_counts(FollowCounts {
            followers: 4,
            following: 2,
        });
        let mut tracker = FollowTracker::new(viewer());

        let counts = tracker.refresh_counts(&api).await.unwrap();
        assert_eq!(counts.followers, 4);
        tracker.refresh_counts(&api).await;
        assert_eq!(api.count_fetches(), 1);

        tracker.handle_event(&followed("u5", "me"));
        api.set_counts(FollowCounts {
            followers: 5,
            following: 2,
        });
        assert_eq!(tracker.refresh_counts(&api).await.unwrap().followers, 5);
        assert_eq!(api.count_fetches(), 2);
    }

    #[tokio::test]
    async fn test_failed_count_refresh_keeps_previous() {
        let api = FakeApi::default();
        api.set_counts(FollowCounts {
            followers: 1,
            following: 1,
        });
        let mut tracker = FollowTracker::new(viewer());
        tracker.refresh_counts(&api).await;

        tracker.invalidate_counts();
        api.fail_all(true);
        assert_eq!(tracker.refresh_counts(&api).await.unwrap().followers, 1);
        assert!(tracker.counts_stale());
    }
}
