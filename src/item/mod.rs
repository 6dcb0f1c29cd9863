//! The item contract consumed by a download list.
//!
//! A download list never fetches anything itself. It drives values implementing
//! [`MediaItem`], which own their state machine, publish status and metadata
//! notifications to registered listeners, and run their own download.
//!
//! - [`listeners`] - Thread-safe listener registry with unsubscribe handles
//! - [`tracked`] - [`TrackedItem`], a ready-made item built on a pluggable [`MediaFetcher`]

mod listeners;
mod tracked;

pub use listeners::ListenerSet;
pub use tracked::{MediaFetcher, ProgressReporter, TrackedItem};

use crate::error::Result;
use crate::types::{DownloadState, ItemId, MediaMetadata, MediaType};
use async_trait::async_trait;
use std::sync::Arc;

/// Status notification published by an item on every state or progress change
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatusNotification {
    /// Item that changed
    pub item: ItemId,
    /// Its new state
    pub state: DownloadState,
    /// Its progress in [0, 1]
    pub progress: f64,
}

/// Metadata notification published once an item has resolved its metadata
#[derive(Clone, Debug, PartialEq)]
pub struct MetadataNotification {
    /// Item that resolved metadata
    pub item: ItemId,
    /// The metadata
    pub metadata: MediaMetadata,
}

/// Callback receiving [`StatusNotification`]s. May be invoked from any thread.
pub type StatusListener = Arc<dyn Fn(StatusNotification) + Send + Sync>;

/// Callback receiving [`MetadataNotification`]s. May be invoked from any thread.
pub type MetadataListener = Arc<dyn Fn(MetadataNotification) + Send + Sync>;

/// A single downloadable media entry
///
/// Implementations own their transitions between `Initialized`, the transient
/// in-progress states and the terminal `Ready`/`Error` states, and report
/// `Removed` when they leave their collection.
///
/// # Liveness
///
/// `download` must always leave the item in a settled state. A failure is
/// reported as an `Error` state notification, not only as a returned error;
/// a list waits for terminal notifications to free concurrency slots.
#[async_trait]
pub trait MediaItem: Send + Sync {
    /// Stable identity within a collection
    fn id(&self) -> ItemId;

    /// Current title
    fn title(&self) -> String;

    /// Channel or group the item belongs to, if known
    fn channel_name(&self) -> Option<String>;

    /// Current state
    fn state(&self) -> DownloadState;

    /// Current progress in [0, 1]
    fn progress(&self) -> f64;

    /// Register a status listener
    fn subscribe_status(&self, listener: StatusListener) -> Subscription;

    /// Register a metadata listener
    fn subscribe_metadata(&self, listener: MetadataListener) -> Subscription;

    /// Download the item in the given format
    ///
    /// With `skip_if_downloaded`, media already present goes straight to `Ready`.
    /// Calling this on an item that is not `Initialized` does nothing.
    async fn download(&self, media_type: MediaType, skip_if_downloaded: bool) -> Result<()>;

    /// Force the item into `Error` unless it has already settled
    fn fail(&self, reason: &str);
}

/// Handle to a registered listener
///
/// The detach action runs exactly once: on [`Subscription::unsubscribe`], or
/// when the handle is dropped.
#[must_use = "dropping a Subscription detaches its listener immediately"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Create a handle that runs `detach` when released
    pub fn new(detach: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// A handle with nothing to detach
    pub fn detached() -> Self {
        Self { detach: None }
    }

    /// Whether the listener is still registered through this handle
    pub fn is_attached(&self) -> bool {
        self.detach.is_some()
    }

    /// Remove the listener
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.is_attached())
            .finish()
    }
}
