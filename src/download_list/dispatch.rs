//! Item dispatch with a completion guard.

use std::sync::Arc;

use crate::item::MediaItem;
use crate::types::{ListId, MediaType};

/// Run `item.download` on its own task and make sure the item settles
///
/// A supervising task awaits the download. If it returned an error, panicked,
/// or came back with the item still unsettled, the item is forced into
/// `Error`, which produces the terminal notification that frees its slot.
pub(super) fn spawn_download(
    list: ListId,
    item: Arc<dyn MediaItem>,
    media_type: MediaType,
    skip_if_downloaded: bool,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let item_id = item.id();

        let worker = {
            let item = Arc::clone(&item);
            tokio::spawn(async move { item.download(media_type, skip_if_downloaded).await })
        };

        let failure = match worker.await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                tracing::warn!(
                    list_id = list.0,
                    item_id = item_id.0,
                    error = %e,
                    "Item download failed"
                );
                Some(e.to_string())
            }
            Err(e) if e.is_panic() => {
                tracing::error!(
                    list_id = list.0,
                    item_id = item_id.0,
                    "Item download panicked"
                );
                Some("download task panicked".to_string())
            }
            Err(e) => Some(format!("download task aborted: {}", e)),
        };

        let state = item.state();
        if state.is_settled() {
            return;
        }

        let reason = failure
            .unwrap_or_else(|| "download finished without reaching a terminal state".to_string());
        tracing::warn!(
            list_id = list.0,
            item_id = item_id.0,
            state = %state,
            reason = %reason,
            "Forcing unsettled item into error state"
        );
        item.fail(&reason);
    })
}
