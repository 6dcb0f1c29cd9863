//! Common test utilities for playlist-dl integration tests

#[allow(dead_code)]
pub mod fetcher;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fetcher::*;

use std::sync::Arc;

use playlist_dl::{Collection, ItemId, MediaItem, TrackedItem};

/// A tracked item wired to a scripted fetcher
pub type ScriptedItem = Arc<TrackedItem<ScriptedFetcher>>;

/// Build an item titled `title` whose fetch is driven by the returned control
#[allow(dead_code)]
pub fn scripted_item(id: u64, title: &str, channel: &str) -> (ScriptedItem, FetchControl) {
    let (fetcher, control) = ScriptedFetcher::new(title, channel);
    let item = TrackedItem::new(ItemId(id), title, fetcher).with_channel_name(channel);
    (Arc::new(item), control)
}

/// Build `count` items on the same channel, titled "Video 1", "Video 2", ...
#[allow(dead_code)]
pub fn scripted_items(count: u64, channel: &str) -> (Vec<ScriptedItem>, Vec<FetchControl>) {
    (1..=count)
        .map(|id| scripted_item(id, &format!("Video {}", id), channel))
        .unzip()
}

/// Like [`scripted_items`], with every fetch counted in `in_flight`
#[allow(dead_code)]
pub fn tracked_items(
    count: u64,
    channel: &str,
    in_flight: &Arc<InFlight>,
) -> (Vec<ScriptedItem>, Vec<FetchControl>) {
    (1..=count)
        .map(|id| {
            let title = format!("Video {}", id);
            let (fetcher, control) = ScriptedFetcher::new(&title, channel);
            let item = TrackedItem::new(ItemId(id), &title, fetcher.tracking(in_flight))
                .with_channel_name(channel);
            (Arc::new(item), control)
        })
        .unzip()
}

/// Collection over `items` in order
#[allow(dead_code)]
pub fn collection_of(items: &[ScriptedItem]) -> Collection {
    Collection::with_items(items.iter().map(|item| item.clone() as Arc<dyn MediaItem>))
}
