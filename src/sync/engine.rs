//! Reconciliation engine.
//!
//! A keyed, ordered collection of entities that accepts optimistic local
//! mutations and remote events. Each row tracks whether it is in sync with the
//! server, waiting on an optimistic request, or was rolled back.

use uuid::Uuid;

use crate::models::{Comment, Conversation, Message, Post};

/// Row identity. Optimistic rows get a local id until the server assigns one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Local(Uuid),
    Remote(String),
}

impl EntityKey {
    pub fn new_local() -> Self {
        EntityKey::Local(Uuid::new_v4())
    }

    pub fn remote_id(&self) -> Option<&str> {
        match self {
            EntityKey::Remote(id) => Some(id),
            EntityKey::Local(_) => None,
        }
    }
}

/// Insert position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Head,
    Tail,
}

/// Like/unlike direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn from_liked(liked: bool) -> Self {
        if liked {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    pub fn inverse(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// The viewer flag value this direction leads to.
    pub fn liked(self) -> bool {
        self == Direction::Up
    }
}

/// Per-row synchronization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Synced,
    /// `n` optimistic requests are still outstanding.
    OptimisticPending(u32),
    RolledBack,
}

/// Result of applying a remote like event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteLike {
    Applied,
    /// The viewer's own action came back; already reflected locally.
    SelfEcho,
    Missing,
}

/// Final state of an optimistic action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    Confirmed,
    RolledBack,
    /// The row is gone (deleted or the view was torn down); nothing to do.
    Stale,
}

/// An outstanding optimistic like/unlike, held by the caller until the request
/// finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeTicket {
    pub entity_id: String,
    pub direction: Direction,
    pub was_liked: bool,
}

/// Entities the engine can track.
pub trait Entity: Clone {
    /// Server id; empty for optimistic copies.
    fn id(&self) -> &str;

    /// Copy client-only fields from the row this entity replaces.
    fn adopt_client_state(&mut self, _previous: &Self) {}
}

/// Entities with a like counter and a viewer like flag.
pub trait Likeable: Entity {
    fn like_count(&self) -> u32;
    fn set_like_count(&mut self, count: u32);
    fn liked_by_viewer(&self) -> bool;
    fn set_liked_by_viewer(&mut self, liked: bool);
}

#[derive(Debug, Clone)]
pub struct Tracked<T> {
    pub key: EntityKey,
    pub entity: T,
    pub state: SyncState,
}

/// A row taken out by `remove_entity`, restorable on rollback.
#[derive(Debug, Clone)]
pub struct Removed<T> {
    index: usize,
    row: Tracked<T>,
}

impl<T> Removed<T> {
    pub fn entity(&self) -> &T {
        &self.row.entity
    }
}

/// Ordered collection mirroring the rendered slice of a list.
#[derive(Debug, Clone)]
pub struct ReconcileList<T> {
    rows: Vec<Tracked<T>>,
}

impl<T> Default for ReconcileList<T> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<T: Entity> ReconcileList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a server fetch, replacing everything.
    pub fn from_server(items: Vec<T>) -> Self {
        let mut list = Self::new();
        list.extend_tail(items);
        list
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.iter().map(|r| &r.entity)
    }

    pub fn rows(&self) -> &[Tracked<T>] {
        &self.rows
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_of(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.index_of(id).map(|i| &self.rows[i].entity)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.index_of(id).map(move |i| &mut self.rows[i].entity)
    }

    pub fn get_by_key(&self, key: &EntityKey) -> Option<&T> {
        self.index_of_key(key).map(|i| &self.rows[i].entity)
    }

    pub fn state(&self, id: &str) -> Option<SyncState> {
        self.index_of(id).map(|i| self.rows[i].state)
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        if id.is_empty() {
            return None;
        }
        self.rows
            .iter()
            .position(|r| r.key.remote_id() == Some(id))
    }

    fn index_of_key(&self, key: &EntityKey) -> Option<usize> {
        self.rows.iter().position(|r| &r.key == key)
    }

    /// Insert a server-known entity unless a row with its id exists.
    pub fn insert_if_absent(&mut self, entity: T, position: Position) -> bool {
        if self.contains(entity.id()) {
            return false;
        }
        let row = Tracked {
            key: EntityKey::Remote(entity.id().to_string()),
            entity,
            state: SyncState::Synced,
        };
        match position {
            Position::Head => self.rows.insert(0, row),
            Position::Tail => self.rows.push(row),
        }
        true
    }

    /// Append a fetched page, skipping ids already present.
    pub fn extend_tail(&mut self, items: Vec<T>) -> usize {
        items
            .into_iter()
            .filter(|item| !item.id().is_empty())
            .map(|item| self.insert_if_absent(item, Position::Tail))
            .filter(|inserted| *inserted)
            .count()
    }

    /// Insert an optimistic copy under a fresh local key.
    pub fn insert_local(&mut self, entity: T, position: Position) -> EntityKey {
        let key = EntityKey::new_local();
        let row = Tracked {
            key: key.clone(),
            entity,
            state: SyncState::OptimisticPending(1),
        };
        match position {
            Position::Head => self.rows.insert(0, row),
            Position::Tail => self.rows.push(row),
        }
        key
    }

    /// Swap an optimistic row for the server-confirmed entity. If the server's
    /// echo was already inserted, the local row is dropped instead so the id
    /// appears once.
    pub fn confirm_local(&mut self, key: &EntityKey, mut entity: T) -> Settled {
        let Some(index) = self.index_of_key(key) else {
            tracing::debug!("Confirmation for a row no longer tracked");
            return Settled::Stale;
        };

        if self.contains(entity.id()) {
            self.rows.remove(index);
            return Settled::Confirmed;
        }

        let row = &mut self.rows[index];
        entity.adopt_client_state(&row.entity);
        row.key = EntityKey::Remote(entity.id().to_string());
        row.entity = entity;
        row.state = SyncState::Synced;
        Settled::Confirmed
    }

    /// Drop an optimistic row whose create request failed.
    pub fn discard_local(&mut self, key: &EntityKey) -> Option<T> {
        let index = self.index_of_key(key)?;
        Some(self.rows.remove(index).entity)
    }

    /// Merge a server update into the row, keeping client-only fields.
    pub fn apply_entity_replace<F>(&mut self, id: &str, merge: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        match self.get_mut(id) {
            Some(entity) => {
                merge(entity);
                true
            }
            None => false,
        }
    }

    /// Remove a row, returning it so an optimistic delete can be undone.
    pub fn remove_entity(&mut self, id: &str) -> Option<Removed<T>> {
        let index = self.index_of(id)?;
        let row = self.rows.remove(index);
        Some(Removed { index, row })
    }

    /// Put back a row taken by `remove_entity`, unless the id reappeared.
    pub fn restore(&mut self, removed: Removed<T>) -> bool {
        if self.contains(removed.row.entity.id()) {
            return false;
        }
        let index = removed.index.min(self.rows.len());
        let mut row = removed.row;
        row.state = SyncState::RolledBack;
        self.rows.insert(index, row);
        true
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&T) -> bool,
    {
        self.rows.retain(|r| keep(&r.entity));
    }

    /// Stable sort of the rendered order.
    pub fn sort_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&T, &T) -> std::cmp::Ordering,
    {
        self.rows.sort_by(|a, b| compare(&a.entity, &b.entity));
    }

    fn begin_pending(&mut self, index: usize) {
        let row = &mut self.rows[index];
        row.state = match row.state {
            SyncState::OptimisticPending(n) => SyncState::OptimisticPending(n + 1),
            _ => SyncState::OptimisticPending(1),
        };
    }

    /// Close one outstanding request on the row. Returns the resulting state.
    fn end_pending(&mut self, index: usize, failed: bool) -> SyncState {
        let row = &mut self.rows[index];
        row.state = match (row.state, failed) {
            (SyncState::OptimisticPending(n), _) if n > 1 => SyncState::OptimisticPending(n - 1),
            (_, true) => SyncState::RolledBack,
            (_, false) => SyncState::Synced,
        };
        row.state
    }
}

impl<T: Likeable> ReconcileList<T> {
    /// Adjust the counter; when the actor is the viewer also set the flag.
    pub fn apply_like_delta(&mut self, id: &str, direction: Direction, actor_is_self: bool) -> bool {
        let Some(entity) = self.get_mut(id) else {
            return false;
        };
        let count = entity.like_count();
        entity.set_like_count(match direction {
            Direction::Up => count.saturating_add(1),
            Direction::Down => count.saturating_sub(1),
        });
        if actor_is_self {
            entity.set_liked_by_viewer(direction.liked());
        }
        true
    }

    /// Apply a pushed like/unlike. A self-originated event whose effect is
    /// already visible (flag already at the target) is an echo and is not
    /// applied again.
    pub fn apply_remote_like(
        &mut self,
        id: &str,
        direction: Direction,
        actor_is_self: bool,
    ) -> RemoteLike {
        let Some(entity) = self.get(id) else {
            return RemoteLike::Missing;
        };
        if actor_is_self && entity.liked_by_viewer() == direction.liked() {
            tracing::debug!("Self echo for {} ignored", id);
            return RemoteLike::SelfEcho;
        }
        self.apply_like_delta(id, direction, actor_is_self);
        RemoteLike::Applied
    }

    /// Optimistically flip the viewer's like on a row.
    pub fn begin_like_toggle(&mut self, id: &str) -> Option<LikeTicket> {
        let index = self.index_of(id)?;
        let was_liked = self.rows[index].entity.liked_by_viewer();
        let direction = Direction::from_liked(!was_liked);
        self.apply_like_delta(id, direction, true);
        self.begin_pending(index);
        Some(LikeTicket {
            entity_id: id.to_string(),
            direction,
            was_liked,
        })
    }

    /// Finish an optimistic like. On failure the inverse delta is applied, so
    /// deltas from other actors that arrived meanwhile are kept.
    pub fn settle_like(&mut self, ticket: &LikeTicket, ok: bool) -> Settled {
        let Some(index) = self.index_of(&ticket.entity_id) else {
            tracing::debug!("Like settled for untracked {}", ticket.entity_id);
            return Settled::Stale;
        };
        if ok {
            self.end_pending(index, false);
            return Settled::Confirmed;
        }

        let entity = &mut self.rows[index].entity;
        let count = entity.like_count();
        entity.set_like_count(match ticket.direction.inverse() {
            Direction::Up => count.saturating_add(1),
            Direction::Down => count.saturating_sub(1),
        });
        entity.set_liked_by_viewer(ticket.was_liked);
        self.end_pending(index, true);
        Settled::RolledBack
    }
}

impl Entity for Post {
    fn id(&self) -> &str {
        &self.id
    }

    fn adopt_client_state(&mut self, previous: &Self) {
        self.is_liked_by_viewer = previous.is_liked_by_viewer;
    }
}

impl Likeable for Post {
    fn like_count(&self) -> u32 {
        self.likes_count
    }
    fn set_like_count(&mut self, count: u32) {
        self.likes_count = count;
    }
    fn liked_by_viewer(&self) -> bool {
        self.is_liked_by_viewer
    }
    fn set_liked_by_viewer(&mut self, liked: bool) {
        self.is_liked_by_viewer = liked;
    }
}

impl Entity for Comment {
    fn id(&self) -> &str {
        &self.id
    }

    fn adopt_client_state(&mut self, previous: &Self) {
        self.is_liked_by_viewer = previous.is_liked_by_viewer;
        self.replies_expanded = previous.replies_expanded;
    }
}

impl Likeable for Comment {
    fn like_count(&self) -> u32 {
        self.likes_count
    }
    fn set_like_count(&mut self, count: u32) {
        self.likes_count = count;
    }
    fn liked_by_viewer(&self) -> bool {
        self.is_liked_by_viewer
    }
    fn set_liked_by_viewer(&mut self, liked: bool) {
        self.is_liked_by_viewer = liked;
    }
}

impl Entity for Conversation {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Message {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: String,
        likes: u32,
        liked: bool,
        note: &'static str,
    }

    fn item(id: &str, likes: u32, liked: bool) -> Item {
        Item {
            id: id.to_string(),
            likes,
            liked,
            note: "",
        }
    }

    impl Entity for Item {
        fn id(&self) -> &str {
            &self.id
        }
        fn adopt_client_state(&mut self, previous: &Self) {
            self.note = previous.note;
        }
    }

    impl Likeable for Item {
        fn like_count(&self) -> u32 {
            self.likes
        }
        fn set_like_count(&mut self, count: u32) {
            self.likes = count;
        }
        fn liked_by_viewer(&self) -> bool {
            self.liked
        }
        fn set_liked_by_viewer(&mut self, liked: bool) {
            self.liked = liked;
        }
    }

    #[test]
    fn test_insert_if_absent_dedupes() {
        let mut list = ReconcileList::new();
        assert!(list.insert_if_absent(item("a", 0, false), Position::Tail));
        assert!(!list.insert_if_absent(item("a", 9, false), Position::Head));
        assert_eq!(list.len(), 1);
        assert_eq!(list.get("a").unwrap().likes, 0);
    }

    #[test]
    fn test_confirm_replaces_local_key() {
        let mut list = ReconcileList::new();
        let mut draft = item("", 0, false);
        draft.note = "draft";
        let key = list.insert_local(draft, Position::Head);

        assert_eq!(list.confirm_local(&key, item("a", 0, false)), Settled::Confirmed);
        assert_eq!(list.len(), 1);
        assert_eq!(list.get("a").unwrap().note, "draft");
        assert_eq!(list.state("a"), Some(SyncState::Synced));
    }

    #[test]
    fn test_confirm_after_echo_keeps_single_row() {
        let mut list = ReconcileList::new();
        let key = list.insert_local(item("", 0, false), Position::Head);
        list.insert_if_absent(item("a", 0, false), Position::Head);
        assert_eq!(list.len(), 2);

        list.confirm_local(&key, item("a", 0, false));
        assert_eq!(list.len(), 1);
        assert!(list.get_by_key(&key).is_none());
    }

    #[test]
    fn test_remote_like_from_other_keeps_flag() {
        let mut list = ReconcileList::from_server(vec![item("a", 3, true)]);
        assert_eq!(list.apply_remote_like("a", Direction::Up, false), RemoteLike::Applied);
        assert_eq!(list.get("a").unwrap().likes, 4);
        assert!(list.get("a").unwrap().liked);
    }

    #[test]
    fn test_self_echo_not_applied_twice() {
        let mut list = ReconcileList::from_server(vec![item("a", 3, false)]);
        let ticket = list.begin_like_toggle("a").unwrap();
        assert_eq!(list.state("a"), Some(SyncState::OptimisticPending(1)));

        assert_eq!(list.apply_remote_like("a", Direction::Up, true), RemoteLike::SelfEcho);
        assert_eq!(list.settle_like(&ticket, true), Settled::Confirmed);
        assert_eq!(list.get("a").unwrap().likes, 4);
        assert_eq!(list.state("a"), Some(SyncState::Synced));
    }

    #[test]
    fn test_rollback_keeps_concurrent_other_deltas() {
        let mut list = ReconcileList::from_server(vec![item("a", 3, false)]);
        let ticket = list.begin_like_toggle("a").unwrap();
        list.apply_remote_like("a", Direction::Up, false);

        assert_eq!(list.settle_like(&ticket, false), Settled::RolledBack);
        let a = list.get("a").unwrap();
        assert_eq!(a.likes, 4);
        assert!(!a.liked);
        assert_eq!(list.state("a"), Some(SyncState::RolledBack));
    }

    #[test]
    fn test_unlike_never_underflows() {
        let mut list = ReconcileList::from_server(vec![item("a", 0, false)]);
        list.apply_like_delta("a", Direction::Down, false);
        assert_eq!(list.get("a").unwrap().likes, 0);
    }

    #[test]
    fn test_settle_after_removal_is_stale() {
        let mut list = ReconcileList::from_server(vec![item("a", 0, false)]);
        let ticket = list.begin_like_toggle("a").unwrap();
        list.remove_entity("a");
        assert_eq!(list.settle_like(&ticket, false), Settled::Stale);
    }

    #[test]
    fn test_restore_puts_row_back_in_place() {
        let mut list = ReconcileList::from_server(vec![
            item("a", 0, false),
            item("b", 0, false),
            item("c", 0, false),
        ]);
        let removed = list.remove_entity("b").unwrap();
        assert!(list.restore(removed));
        let ids: Vec<&str> = list.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(list.state("b"), Some(SyncState::RolledBack));
    }
}
