//! Change notification for data-block edits.
//!
//! Renames, remaps, creations and frees are published to subscribers
//! registered on a [`Main`](crate::Main). Callbacks run synchronously on the
//! thread performing the edit, after the edit is complete.

use crate::types::{IdType, SessionUid};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// What happened to a data-block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdChangeKind {
    /// The data-block was added to the database.
    Created,
    /// The data-block got a new name.
    Renamed {
        /// Name before the rename.
        old_name: String,
        /// Name after the rename.
        new_name: String,
    },
    /// Some outgoing reference of the data-block was rewritten.
    Remapped,
    /// The data-block was deleted.
    Freed,
}

/// A change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdChange {
    /// Runtime identity of the changed data-block.
    pub session_uid: SessionUid,
    /// Type of the changed data-block.
    pub id_type: IdType,
    /// What happened.
    pub kind: IdChangeKind,
}

/// Callback receiving change events.
pub type ChangeCallback = Arc<dyn Fn(&IdChange) + Send + Sync>;

/// Identifies a subscription for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Subscriber list shared by the database and its observers.
#[derive(Default)]
pub struct ChangeNotifier {
    subscribers: RwLock<Vec<(SubscriberId, ChangeCallback)>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.subscribers.read().len())
            .finish()
    }
}

impl ChangeNotifier {
    /// Create a notifier without subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber.
    pub fn subscribe(&self, callback: ChangeCallback) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, callback));
        id
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        subscribers.len() != before
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Whether nobody is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Deliver an event to every subscriber.
    pub fn notify(&self, change: &IdChange) {
        // Clone the list so callbacks may subscribe or unsubscribe.
        let subscribers: Vec<ChangeCallback> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for subscriber in subscribers {
            subscriber(change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn event(kind: IdChangeKind) -> IdChange {
        IdChange {
            session_uid: SessionUid::new(1),
            id_type: IdType::Object,
            kind,
        }
    }

    #[test]
    fn subscriber_notification() {
        let notifier = ChangeNotifier::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        notifier.subscribe(Arc::new(move |change: &IdChange| {
            sink.lock().push(change.clone());
        }));

        notifier.notify(&event(IdChangeKind::Created));
        notifier.notify(&event(IdChangeKind::Freed));

        let received = received.lock();
        assert_eq!(received.len(), 2);
        assert_eq!(received[1].kind, IdChangeKind::Freed);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let notifier = ChangeNotifier::new();
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        let id = notifier.subscribe(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        }));

        notifier.notify(&event(IdChangeKind::Remapped));
        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.notify(&event(IdChangeKind::Remapped));

        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert!(notifier.is_empty());
    }
}
