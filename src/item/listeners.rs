//! Listener registry shared by item implementations.

use super::Subscription;
use std::sync::{Arc, Mutex, PoisonError, Weak};

type Listener<T> = Arc<dyn Fn(T) + Send + Sync>;

struct Table<T> {
    next_key: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

/// Multicast registry of listeners for one notification kind
///
/// `notify` copies the current listeners out of the lock before invoking
/// them, so a listener may unsubscribe (itself or others) while being called.
/// Subscriptions hold only a weak reference and never keep the registry alive.
pub struct ListenerSet<T> {
    table: Arc<Mutex<Table<T>>>,
}

impl<T> Default for ListenerSet<T> {
    fn default() -> Self {
        Self {
            table: Arc::new(Mutex::new(Table {
                next_key: 0,
                listeners: Vec::new(),
            })),
        }
    }
}

impl<T: Clone + 'static> ListenerSet<T> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; dropping or consuming the handle removes it
    pub fn subscribe(&self, listener: Listener<T>) -> Subscription {
        let key = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            let key = table.next_key;
            table.next_key += 1;
            table.listeners.push((key, listener));
            key
        };

        let table: Weak<Mutex<Table<T>>> = Arc::downgrade(&self.table);
        Subscription::new(move || {
            if let Some(table) = table.upgrade() {
                let mut table = table.lock().unwrap_or_else(PoisonError::into_inner);
                table.listeners.retain(|(k, _)| *k != key);
            }
        })
    }

    /// Invoke every registered listener with `value`
    pub fn notify(&self, value: T) {
        let listeners: Vec<Listener<T>> = {
            let table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in listeners {
            listener(value.clone());
        }
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .len()
    }

    /// Whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
