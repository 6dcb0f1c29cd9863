//! Bounded-concurrency scheduling over a collection of items.
//!
//! A [`DownloadList`] owns a [`Collection`], keeps at most
//! `concurrency_limit` items downloading at once, and folds per-item status
//! notifications into one aggregate title, state and progress.
//!
//! ## Events
//!
//! Every aggregate change is published as an [`Event`] on a broadcast channel
//! (see [`DownloadList::subscribe`]) and passed to the optional handlers
//! registered on the [`DownloadListBuilder`]. Handlers run on the driver task
//! and must not block.
//!
//! ## Lifecycle
//!
//! The first event after [`start`](DownloadList::start) is `BatchStarted`.
//! Exactly one `AllFinished` event is emitted once no item is running and every
//! item has ended in `Ready` or `Error`. [`delete`](DownloadList::delete)
//! detaches from every item and emits `Removed` once. Dropping the last
//! handle deletes the list as well.

mod aggregate;
mod dispatch;
mod driver;

#[cfg(test)]
pub(crate) mod test_helpers;


use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};

use crate::collection::Collection;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{DownloadState, Event, ListId, ListSnapshot, MediaType};
use driver::{Command, ListDriver};

/// Callback invoked with each emitted [`Event`]
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Clone, Default)]
pub(crate) struct EventHandlers {
    pub(crate) on_status: Option<EventHandler>,
    pub(crate) on_metadata: Option<EventHandler>,
}

/// Builder for a [`DownloadList`] with optional event handlers
pub struct DownloadListBuilder {
    collection: Collection,
    config: Config,
    handlers: EventHandlers,
}

impl DownloadListBuilder {
    /// Handler for aggregate `StatusChanged` events
    pub fn on_status_changed(mut self, handler: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.handlers.on_status = Some(Arc::new(handler));
        self
    }

    /// Handler for `MetadataAvailable` events
    pub fn on_metadata_available(
        mut self,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Self {
        self.handlers.on_metadata = Some(Arc::new(handler));
        self
    }

    /// Validate the configuration and spawn the list driver
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> Result<DownloadList> {
        self.config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Runtime(e.to_string()))?;

        let id = ListId::next();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(self.config.event_buffer_size);

        let driver = ListDriver::new(
            id,
            self.config.clone(),
            self.collection,
            event_tx.clone(),
            self.handlers,
            command_rx,
        );
        runtime.spawn(driver.run());

        Ok(DownloadList {
            id,
            config: Arc::new(self.config),
            commands: command_tx,
            event_tx,
        })
    }
}

/// Handle to a running download list
///
/// Cheap to clone; all clones address the same list. The list is deleted when
/// the last clone is dropped.
#[derive(Clone)]
pub struct DownloadList {
    id: ListId,
    config: Arc<Config>,
    commands: mpsc::UnboundedSender<Command>,
    event_tx: broadcast::Sender<Event>,
}

impl DownloadList {
    /// Create a list over `collection` with no handlers
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(collection: Collection, config: Config) -> Result<Self> {
        Self::builder(collection, config).build()
    }

    /// Start configuring a list over `collection`
    pub fn builder(collection: Collection, config: Config) -> DownloadListBuilder {
        DownloadListBuilder {
            collection,
            config,
            handlers: EventHandlers::default(),
        }
    }

    /// Begin downloading
    ///
    /// Emits `BatchStarted` and admits the first item. Subsequent items are
    /// admitted as running items report progress, up to the concurrency limit.
    /// Starting an empty list does nothing; starting a deleted list repeats
    /// the delete.
    pub fn start(&self, skip_if_downloaded: bool) {
        self.send(Command::Start { skip_if_downloaded });
    }

    /// Detach from every item, clear the collection, and emit `Removed`
    ///
    /// Safe to call more than once; only the first call emits.
    pub fn delete(&self) {
        self.send(Command::Delete);
    }

    /// Subscribe to this list's events
    ///
    /// Only events emitted after subscribing are received.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current aggregate view of the list
    pub async fn snapshot(&self) -> Result<ListSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot(reply_tx))
            .map_err(|_| Error::ListClosed)?;
        reply_rx.await.map_err(|_| Error::ListClosed)
    }

    /// Wait until the list reaches `AllFinished` or `Removed`
    ///
    /// Returns that state. A list that is never started never settles.
    pub async fn wait_settled(&self) -> Result<DownloadState> {
        let mut events = self.subscribe();
        let snapshot = self.snapshot().await?;
        if is_final(snapshot.state) {
            return Ok(snapshot.state);
        }

        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Event::StatusChanged { state, .. } = event
                        && is_final(state)
                    {
                        return Ok(state);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(list_id = self.id.0, skipped, "Event receiver lagged");
                    let snapshot = self.snapshot().await?;
                    if is_final(snapshot.state) {
                        return Ok(snapshot.state);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return Err(Error::ListClosed),
            }
        }
    }

    /// This list's identity
    pub fn id(&self) -> ListId {
        self.id
    }

    /// Format requested from every item
    pub fn media_type(&self) -> MediaType {
        self.config.media_type
    }

    /// Maximum number of items downloading at once
    pub fn concurrency_limit(&self) -> usize {
        self.config.concurrency_limit
    }

    /// Whether the driver has stopped
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!(list_id = self.id.0, "Command sent to closed list");
        }
    }
}

fn is_final(state: DownloadState) -> bool {
    matches!(state, DownloadState::AllFinished | DownloadState::Removed)
}

impl std::fmt::Debug for DownloadList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadList")
            .field("id", &self.id)
            .field("media_type", &self.config.media_type)
            .field("concurrency_limit", &self.config.concurrency_limit)
            .finish()
    }
}
