//! Ordered collection of items with aggregate bookkeeping.
//!
//! A [`Collection`] has no concurrency control of its own. The download list
//! that owns it serializes every access.

use crate::item::{MediaItem, Subscription};
use crate::types::{DownloadState, ExecutionStatus, ItemId};
use std::sync::Arc;

/// Listener handles a list keeps for one item
#[derive(Debug, Default)]
pub struct ItemSubscriptions {
    /// Status listener handle
    pub status: Option<Subscription>,
    /// Metadata listener handle
    pub metadata: Option<Subscription>,
}

impl ItemSubscriptions {
    /// Release both handles
    pub fn unsubscribe(self) {
        if let Some(status) = self.status {
            status.unsubscribe();
        }
        if let Some(metadata) = self.metadata {
            metadata.unsubscribe();
        }
    }
}

struct Entry {
    item: Arc<dyn MediaItem>,
    subscriptions: Option<ItemSubscriptions>,
}

/// Ordered sequence of items plus aggregate title, state and progress
///
/// Insertion order is significant and preserved; entries only leave on
/// [`detach`](Collection::detach) or [`delete`](Collection::delete).
pub struct Collection {
    entries: Vec<Entry>,
    /// Aggregate title
    pub title: String,
    /// Aggregate state
    pub state: DownloadState,
    /// Aggregate progress in [0, 1]
    pub progress: f64,
    execution_status: ExecutionStatus,
}

impl Default for Collection {
    fn default() -> Self {
        Self::new()
    }
}

impl Collection {
    /// Create an empty, active collection
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            title: String::new(),
            state: DownloadState::Initialized,
            progress: 0.0,
            execution_status: ExecutionStatus::Active,
        }
    }

    /// Create a collection holding `items` in order, skipping repeated ids
    pub fn with_items(items: impl IntoIterator<Item = Arc<dyn MediaItem>>) -> Self {
        let mut collection = Self::new();
        for item in items {
            collection.push(item);
        }
        collection
    }

    /// Append an item
    ///
    /// Ids are unique within a collection: an item whose id is already
    /// present is not added and `false` is returned.
    pub fn push(&mut self, item: Arc<dyn MediaItem>) -> bool {
        let id = item.id();
        if self.contains(id) {
            tracing::warn!(item_id = id.0, "Item already in collection, not adding");
            return false;
        }
        self.entries.push(Entry {
            item,
            subscriptions: None,
        });
        true
    }

    /// Items in order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn MediaItem>> {
        self.entries.iter().map(|e| &e.item)
    }

    /// Clone of the items in order
    pub fn items(&self) -> Vec<Arc<dyn MediaItem>> {
        self.iter().cloned().collect()
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection holds no items
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Item at `index`
    pub fn get(&self, index: usize) -> Option<&Arc<dyn MediaItem>> {
        self.entries.get(index).map(|e| &e.item)
    }

    /// Index of the item with `id`
    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.entries.iter().position(|e| e.item.id() == id)
    }

    /// Whether an item with `id` is present
    pub fn contains(&self, id: ItemId) -> bool {
        self.position(id).is_some()
    }

    /// Active or deleted
    pub fn execution_status(&self) -> ExecutionStatus {
        self.execution_status
    }

    /// Whether [`delete`](Collection::delete) has run
    pub fn is_deleted(&self) -> bool {
        self.execution_status == ExecutionStatus::Deleted
    }

    /// Store listener handles for the item with `id`, releasing any previous ones
    ///
    /// Returns false (and releases `subscriptions`) if the item is not present.
    pub fn attach(&mut self, id: ItemId, subscriptions: ItemSubscriptions) -> bool {
        match self.entries.iter_mut().find(|e| e.item.id() == id) {
            Some(entry) => {
                if let Some(previous) = entry.subscriptions.replace(subscriptions) {
                    previous.unsubscribe();
                }
                true
            }
            None => {
                subscriptions.unsubscribe();
                false
            }
        }
    }

    /// Unsubscribe and remove the item with `id`
    ///
    /// Returns the removed item, or None if it was not present.
    pub fn detach(&mut self, id: ItemId) -> Option<Arc<dyn MediaItem>> {
        let index = self.position(id)?;
        let entry = self.entries.remove(index);
        if let Some(subscriptions) = entry.subscriptions {
            subscriptions.unsubscribe();
        }
        Some(entry.item)
    }

    /// Mark deleted, unsubscribe from every item, clear, and reset to `Removed` at 0 progress
    ///
    /// Safe to call more than once.
    pub fn delete(&mut self) {
        self.execution_status = ExecutionStatus::Deleted;
        for entry in self.entries.drain(..) {
            if let Some(subscriptions) = entry.subscriptions {
                subscriptions.unsubscribe();
            }
        }
        self.state = DownloadState::Removed;
        self.progress = 0.0;
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("title", &self.title)
            .field("len", &self.entries.len())
            .field("state", &self.state)
            .field("progress", &self.progress)
            .field("execution_status", &self.execution_status)
            .finish()
    }
}
