//! Callback registry for transport and supervisor notifications.
//!
//! Subscribers are plain closures. Notification walks a snapshot of the list
//! taken under the lock, so a callback may subscribe or unsubscribe (itself or
//! others) without deadlocking, and changes only take effect for the next
//! notification.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entries<T> {
    next_id: AtomicU64,
    list: Mutex<Vec<(u64, Callback<T>)>>,
}

/// Ordered set of callbacks receiving `&T`.
///
/// Cloning yields another handle to the same set.
pub struct SubscriberRegistry<T> {
    entries: Arc<Entries<T>>,
}

impl<T> Clone for SubscriberRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<T: 'static> Default for SubscriberRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> SubscriberRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Entries {
                next_id: AtomicU64::new(1),
                list: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register a callback. It stays registered until the returned
    /// subscription is explicitly unsubscribed.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.entries.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.list.lock().push((id, Arc::new(callback)));
        trace!("subscriber {id} registered");

        let weak: Weak<Entries<T>> = Arc::downgrade(&self.entries);
        Subscription {
            id,
            remove: Some(Box::new(move || {
                if let Some(entries) = weak.upgrade() {
                    entries.list.lock().retain(|(entry_id, _)| *entry_id != id);
                }
            })),
        }
    }

    /// Invoke every callback, in registration order.
    pub fn notify(&self, value: &T) {
        let snapshot: Vec<Callback<T>> = self
            .entries
            .list
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in snapshot {
            callback(value);
        }
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.entries.list.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every registered callback.
    pub fn clear(&self) {
        self.entries.list.lock().clear();
    }
}

/// Token returned by [`SubscriberRegistry::subscribe`].
///
/// Dropping it does not unsubscribe; call [`Subscription::unsubscribe`].
pub struct Subscription {
    id: u64,
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Registry-local id of this subscription.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the callback from its registry. A no-op if the registry is gone.
    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
            trace!("subscriber {} removed", self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
