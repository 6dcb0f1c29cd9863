//! Aggregation rules: title derivation and per-pass counts.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::collection::Collection;
use crate::item::MediaItem;
use crate::types::{DownloadState, ItemId};

/// Last `(state, progress)` each item reported to the list
pub(super) type Reported = HashMap<ItemId, (DownloadState, f64)>;

/// What `item` last reported, or its live values if it has not reported yet
pub(super) fn reported_status(
    reported: &Reported,
    item: &Arc<dyn MediaItem>,
) -> (DownloadState, f64) {
    reported
        .get(&item.id())
        .copied()
        .unwrap_or_else(|| (item.state(), item.progress()))
}

/// Counts recomputed over the whole collection on every aggregation pass
#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct Tally {
    /// Items in `Ready` or `Error`
    pub(super) finished: usize,
    /// Items holding a concurrency slot
    pub(super) active: usize,
    /// Mean progress over all items (0 for an empty collection)
    pub(super) average_progress: f64,
    /// Items counted
    pub(super) total: usize,
}

impl Tally {
    /// Count `collection` from reported statuses, treating dispatched items
    /// that still report `Initialized` as active
    pub(super) fn of(
        collection: &Collection,
        reported: &Reported,
        dispatched: &HashSet<ItemId>,
    ) -> Self {
        let mut finished = 0;
        let mut active = 0;
        let mut progress_sum = 0.0;

        for item in collection.iter() {
            let (state, progress) = reported_status(reported, item);
            if state.is_terminal() {
                finished += 1;
            } else if state.is_active()
                || (state == DownloadState::Initialized && dispatched.contains(&item.id()))
            {
                active += 1;
            }
            progress_sum += progress;
        }

        let total = collection.len();
        let average_progress = if total == 0 {
            0.0
        } else {
            progress_sum / total as f64
        };

        Self {
            finished,
            active,
            average_progress,
            total,
        }
    }

    /// Nothing running and every item terminal
    pub(super) fn all_finished(&self) -> bool {
        self.active == 0 && self.finished == self.total
    }
}

/// Title of a collection: a lone item's title, otherwise the first item's
/// channel name, falling back to its title when the channel name is empty
pub(super) fn derive_title(collection: &Collection) -> Option<String> {
    let first = collection.get(0)?;
    if collection.len() == 1 {
        return Some(first.title());
    }
    match first.channel_name() {
        Some(channel) if !channel.is_empty() => Some(channel),
        _ => Some(first.title()),
    }
}
