//! List ordering used by the views.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::models::{Comment, Conversation, Message, Post};

/// Entities with a creation time.
pub trait Timestamped {
    fn created_at(&self) -> DateTime<Utc>;
}

impl Timestamped for Post {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Timestamped for Comment {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Timestamped for Message {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Newer first.
pub fn newest_first<T: Timestamped>(a: &T, b: &T) -> Ordering {
    b.created_at().cmp(&a.created_at())
}

/// Score for featured/top content.
pub fn featured_score(post: &Post) -> u64 {
    u64::from(post.likes_count) * 2 + u64::from(post.comments_count)
}

/// Higher score first, ties broken newer first.
pub fn featured_order(a: &Post, b: &Post) -> Ordering {
    featured_score(b)
        .cmp(&featured_score(a))
        .then_with(|| newest_first(a, b))
}

/// Top `limit` posts by featured score.
pub fn top_featured<'a, I>(posts: I, limit: usize) -> Vec<&'a Post>
where
    I: IntoIterator<Item = &'a Post>,
{
    let mut ranked: Vec<&Post> = posts.into_iter().collect();
    ranked.sort_by(|a, b| featured_order(a, b));
    ranked.truncate(limit);
    ranked
}

/// Pinned conversations first, then most recently updated.
pub fn conversation_order(a: &Conversation, b: &Conversation) -> Ordering {
    b.is_pinned
        .cmp(&a.is_pinned)
        .then_with(|| b.updated_at.cmp(&a.updated_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::test_support::post;

    #[test]
    fn test_featured_score_weights_likes_double() {
        let mut p = post("p1", "u1", 0);
        p.likes_count = 3;
        p.comments_count = 4;
        assert_eq!(featured_score(&p), 10);
    }

    #[test]
    fn test_featured_ties_break_newer_first() {
        let mut older = post("old", "u1", 0);
        older.likes_count = 1;
        let mut newer = post("new", "u1", 60);
        newer.comments_count = 2;
        let mut best = post("best", "u1", 0);
        best.likes_count = 5;

        let ranked = top_featured([&older, &newer, &best], 3);
        let ids: Vec<&str> = ranked.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["best", "new", "old"]);
    }

    #[test]
    fn test_top_featured_truncates() {
        let posts = vec![post("a", "u1", 0), post("b", "u1", 1), post("c", "u1", 2)];
        assert_eq!(top_featured(&posts, 2).len(), 2);
    }
}
