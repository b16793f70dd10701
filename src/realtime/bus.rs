//! In-process event bus fed by the push connection.
//!
//! Each view subscribes to the event kinds it handles and receives them on its
//! own channel. Dropping the [`Subscription`] unsubscribes; dropping a
//! [`RoomGuard`] leaves the room. There are no handler references to match up
//! on teardown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::{ClientCommand, EventKind, ServerEvent};

struct Subscriber {
    id: u64,
    kinds: Vec<EventKind>,
    tx: UnboundedSender<ServerEvent>,
}

struct BusInner {
    next_id: u64,
    subscribers: Vec<Subscriber>,
    /// Joined post rooms, reference counted across views.
    rooms: HashMap<String, usize>,
    /// Dropped on close, which ends the transport's command stream.
    outbound: Option<UnboundedSender<ClientCommand>>,
    closed: bool,
}

fn lock(inner: &Mutex<BusInner>) -> MutexGuard<'_, BusInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared push-event hub.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    /// Create a bus. The receiver yields commands for the transport to send.
    pub fn new() -> (Self, UnboundedReceiver<ClientCommand>) {
        let (outbound, commands) = mpsc::unbounded_channel();
        let bus = Self {
            inner: Arc::new(Mutex::new(BusInner {
                next_id: 1,
                subscribers: Vec::new(),
                rooms: HashMap::new(),
                outbound: Some(outbound),
                closed: false,
            })),
        };
        (bus, commands)
    }

    /// Subscribe to the given event kinds.
    pub fn subscribe(&self, kinds: &[EventKind]) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;

        if inner.closed {
            tracing::debug!("Subscription {} on a closed bus", id);
        } else {
            inner.subscribers.push(Subscriber {
                id,
                kinds: kinds.to_vec(),
                tx,
            });
        }

        Subscription {
            id,
            rx,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver an event to every interested subscriber. Returns the number of
    /// deliveries.
    pub fn publish(&self, event: ServerEvent) -> usize {
        let kind = event.kind();
        let mut inner = lock(&self.inner);
        if inner.closed {
            return 0;
        }

        let mut delivered = 0;
        inner.subscribers.retain(|sub| {
            if !sub.kinds.contains(&kind) {
                return true;
            }
            match sub.tx.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });

        if delivered == 0 {
            tracing::debug!("No subscriber for {}", kind.name());
        }
        delivered
    }

    /// Decode a raw frame from the connection and publish it.
    pub fn dispatch_frame(&self, frame: &str) -> usize {
        match ServerEvent::decode(frame) {
            Some(event) => self.publish(event),
            None => 0,
        }
    }

    /// Join the comment room of a post for as long as the guard lives.
    pub fn join_post(&self, post_id: &str) -> RoomGuard {
        let mut inner = lock(&self.inner);
        let count = inner.rooms.entry(post_id.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 {
            if let Some(outbound) = &inner.outbound {
                let _ = outbound.send(ClientCommand::JoinPost(post_id.to_string()));
            }
        }

        RoomGuard {
            post_id: post_id.to_string(),
            bus: Arc::downgrade(&self.inner),
        }
    }

    pub fn is_in_room(&self, post_id: &str) -> bool {
        lock(&self.inner).rooms.contains_key(post_id)
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner).closed
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).subscribers.len()
    }

    /// End every subscription. Used on logout.
    pub fn close(&self) {
        let mut inner = lock(&self.inner);
        inner.closed = true;
        inner.subscribers.clear();
        inner.rooms.clear();
        inner.outbound = None;
        tracing::info!("Event bus closed");
    }
}

/// A view's live subscription.
pub struct Subscription {
    id: u64,
    rx: UnboundedReceiver<ServerEvent>,
    bus: Weak<Mutex<BusInner>>,
}

impl Subscription {
    /// Wait for the next event. `None` once the bus is closed.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.rx.recv().await
    }

    /// Next already-delivered event, if any.
    pub fn try_recv(&mut self) -> Option<ServerEvent> {
        self.rx.try_recv().ok()
    }

    /// All already-delivered events, in delivery order.
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            lock(&inner).subscribers.retain(|sub| sub.id != self.id);
        }
    }
}

/// Membership in a post's comment room.
pub struct RoomGuard {
    post_id: String,
    bus: Weak<Mutex<BusInner>>,
}

impl RoomGuard {
    pub fn post_id(&self) -> &str {
        &self.post_id
    }
}

impl Drop for RoomGuard {
    fn drop(&mut self) {
        let Some(inner) = self.bus.upgrade() else {
            return;
        };
        let mut inner = lock(&inner);
        let remaining = match inner.rooms.get_mut(&self.post_id) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => return,
        };
        if remaining == 0 {
            inner.rooms.remove(&self.post_id);
            if let Some(outbound) = &inner.outbound {
                let _ = outbound.send(ClientCommand::LeavePost(self.post_id.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::FollowEvent;

    fn follow_event() -> ServerEvent {
        ServerEvent::UserFollowed(FollowEvent {
            follower_id: "u1".to_string(),
            following_id: "u2".to_string(),
        })
    }

    #[tokio::test]
    async fn test_only_interested_subscribers_receive() {
        let (bus, _commands) = EventBus::new();
        let mut follows = bus.subscribe(&[EventKind::UserFollowed]);
        let mut chat = bus.subscribe(&[EventKind::MessageNew]);

        assert_eq!(bus.publish(follow_event()), 1);
        assert_eq!(follows.recv().await, Some(follow_event()));
        assert!(chat.try_recv().is_none());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let (bus, _commands) = EventBus::new();
        let sub = bus.subscribe(&[EventKind::UserFollowed]);
        assert_eq!(bus.subscriber_count(), 1);

        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(follow_event()), 0);
    }

    #[test]
    fn test_remount_does_not_duplicate_delivery() {
        let (bus, _commands) = EventBus::new();
        let first = bus.subscribe(&[EventKind::UserFollowed]);
        drop(first);
        let mut second = bus.subscribe(&[EventKind::UserFollowed]);

        bus.publish(follow_event());
        assert_eq!(second.drain().len(), 1);
    }

    #[test]
    fn test_room_join_and_leave_are_reference_counted() {
        let (bus, mut commands) = EventBus::new();
        let a = bus.join_post("p1");
        let b = bus.join_post("p1");
        assert_eq!(
            commands.try_recv().ok(),
            Some(ClientCommand::JoinPost("p1".to_string()))
        );
        assert!(commands.try_recv().is_err());

        drop(a);
        assert!(bus.is_in_room("p1"));
        assert!(commands.try_recv().is_err());

        drop(b);
        assert!(!bus.is_in_room("p1"));
        assert_eq!(
            commands.try_recv().ok(),
            Some(ClientCommand::LeavePost("p1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_close_ends_subscriptions() {
        let (bus, mut commands) = EventBus::new();
        let mut sub = bus.subscribe(&[EventKind::UserFollowed]);

        bus.close();
        assert_eq!(sub.recv().await, None);
        assert_eq!(bus.publish(follow_event()), 0);

        let mut late = bus.subscribe(&[EventKind::UserFollowed]);
        assert_eq!(late.recv().await, None);
        assert!(bus.is_closed());
        assert_eq!(commands.recv().await, None);
    }

    #[test]
    fn test_dispatch_frame_decodes() {
        let (bus, _commands) = EventBus::new();
        let mut sub = bus.subscribe(&[EventKind::UserFollowed]);

        let delivered = bus.dispatch_frame(
            r#"{"event":"userFollowed","data":{"followerId":"u1","followingId":"u2"}}"#,
        );
        assert_eq!(delivered, 1);
        assert_eq!(sub.try_recv(), Some(follow_event()));
    }
}
