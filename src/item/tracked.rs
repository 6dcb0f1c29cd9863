//! Reference item implementation driven by a pluggable transport.

use super::{
    ListenerSet, MediaItem, MetadataListener, MetadataNotification, StatusListener,
    StatusNotification, Subscription,
};
use crate::error::{Error, Result};
use crate::types::{DownloadState, ItemId, MediaMetadata, MediaType};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Transport seam of a [`TrackedItem`]: metadata extraction and stream fetching
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Resolve metadata for the requested format
    async fn resolve(&self, media_type: MediaType) -> Result<MediaMetadata>;

    /// Whether the media described by `metadata` is already present locally
    async fn is_downloaded(&self, metadata: &MediaMetadata, media_type: MediaType) -> bool;

    /// Fetch the media, reporting progress through `progress`
    async fn fetch(
        &self,
        metadata: &MediaMetadata,
        media_type: MediaType,
        progress: ProgressReporter<'_>,
    ) -> Result<()>;
}

/// Progress callback handed to [`MediaFetcher::fetch`]
#[derive(Clone, Copy)]
pub struct ProgressReporter<'a> {
    report: &'a (dyn Fn(f64) + Send + Sync),
}

impl<'a> ProgressReporter<'a> {
    /// Wrap a progress callback
    pub fn new(report: &'a (dyn Fn(f64) + Send + Sync)) -> Self {
        Self { report }
    }

    /// Report progress as a fraction; values outside [0, 1] are clamped, NaN is ignored
    pub fn report(&self, fraction: f64) {
        if fraction.is_nan() {
            return;
        }
        (self.report)(fraction.clamp(0.0, 1.0));
    }
}

#[derive(Debug)]
struct ItemState {
    title: String,
    channel_name: Option<String>,
    state: DownloadState,
    progress: f64,
    metadata: Option<MediaMetadata>,
    last_error: Option<String>,
}

/// An item whose state machine is managed here and whose transport is a [`MediaFetcher`]
///
/// `download` walks `InProgress -> [TitleChanged] -> ProgressChanged* -> Ready`,
/// publishing metadata as soon as the fetcher resolves it. Any fetcher error
/// moves the item to `Error` before being returned.
pub struct TrackedItem<F> {
    id: ItemId,
    fetcher: F,
    inner: Mutex<ItemState>,
    status_listeners: ListenerSet<StatusNotification>,
    metadata_listeners: ListenerSet<MetadataNotification>,
}

impl<F: MediaFetcher> TrackedItem<F> {
    /// Create an `Initialized` item
    pub fn new(id: ItemId, title: impl Into<String>, fetcher: F) -> Self {
        Self {
            id,
            fetcher,
            inner: Mutex::new(ItemState {
                title: title.into(),
                channel_name: None,
                state: DownloadState::Initialized,
                progress: 0.0,
                metadata: None,
                last_error: None,
            }),
            status_listeners: ListenerSet::new(),
            metadata_listeners: ListenerSet::new(),
        }
    }

    /// Set the channel/group name known before metadata resolution
    pub fn with_channel_name(self, channel_name: impl Into<String>) -> Self {
        self.lock().channel_name = Some(channel_name.into());
        self
    }

    /// The transport backing this item
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Metadata resolved by the last download, if any
    pub fn metadata(&self) -> Option<MediaMetadata> {
        self.lock().metadata.clone()
    }

    /// Reason for the last `Error` transition
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Leave the collection: report `Removed`
    ///
    /// A download already running keeps going, but its later transitions are dropped.
    pub fn remove(&self) {
        let progress = self.progress();
        self.transition(DownloadState::Removed, progress);
    }

    fn lock(&self) -> MutexGuard<'_, ItemState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a transition and notify listeners. Returns false if the item had
    /// already settled and the transition was dropped.
    fn transition(&self, state: DownloadState, progress: f64) -> bool {
        {
            let mut inner = self.lock();
            let allowed = match inner.state {
                DownloadState::Removed => false,
                current if current.is_terminal() => state == DownloadState::Removed,
                _ => true,
            };
            if !allowed {
                tracing::trace!(
                    item_id = self.id.0,
                    from = %inner.state,
                    to = %state,
                    "Dropping transition on settled item"
                );
                return false;
            }
            inner.state = state;
            inner.progress = progress;
        }

        self.status_listeners.notify(StatusNotification {
            item: self.id,
            state,
            progress,
        });
        true
    }

    fn report_progress(&self, fraction: f64) {
        if !self.state().is_active() {
            return;
        }
        self.transition(DownloadState::ProgressChanged, fraction);
    }

    /// Record resolved metadata; returns true if the title changed
    fn apply_metadata(&self, metadata: &MediaMetadata) -> bool {
        let mut inner = self.lock();
        inner.metadata = Some(metadata.clone());
        if inner.channel_name.is_none() {
            inner.channel_name = metadata.channel_name.clone();
        }
        if !metadata.title.is_empty() && metadata.title != inner.title {
            inner.title = metadata.title.clone();
            true
        } else {
            false
        }
    }

    fn fail_with(&self, err: Error) -> Error {
        self.fail(&err.to_string());
        err
    }
}

#[async_trait]
impl<F: MediaFetcher> MediaItem for TrackedItem<F> {
    fn id(&self) -> ItemId {
        self.id
    }

    fn title(&self) -> String {
        self.lock().title.clone()
    }

    fn channel_name(&self) -> Option<String> {
        self.lock().channel_name.clone()
    }

    fn state(&self) -> DownloadState {
        self.lock().state
    }

    fn progress(&self) -> f64 {
        self.lock().progress
    }

    fn subscribe_status(&self, listener: StatusListener) -> Subscription {
        self.status_listeners.subscribe(listener)
    }

    fn subscribe_metadata(&self, listener: MetadataListener) -> Subscription {
        self.metadata_listeners.subscribe(listener)
    }

    async fn download(&self, media_type: MediaType, skip_if_downloaded: bool) -> Result<()> {
        let current = self.state();
        if current != DownloadState::Initialized {
            tracing::debug!(item_id = self.id.0, state = %current, "Ignoring download of started item");
            return Ok(());
        }

        self.transition(DownloadState::InProgress, 0.0);

        let metadata = match self.fetcher.resolve(media_type).await {
            Ok(metadata) => metadata,
            Err(e) => return Err(self.fail_with(e)),
        };

        if self.apply_metadata(&metadata) {
            self.transition(DownloadState::TitleChanged, self.progress());
        }
        self.metadata_listeners.notify(MetadataNotification {
            item: self.id,
            metadata: metadata.clone(),
        });

        if skip_if_downloaded && self.fetcher.is_downloaded(&metadata, media_type).await {
            tracing::debug!(item_id = self.id.0, "Media already present, skipping fetch");
            self.transition(DownloadState::Ready, 1.0);
            return Ok(());
        }

        let report = |fraction: f64| self.report_progress(fraction);
        match self
            .fetcher
            .fetch(&metadata, media_type, ProgressReporter::new(&report))
            .await
        {
            Ok(()) => {
                self.transition(DownloadState::Ready, 1.0);
                Ok(())
            }
            Err(e) => Err(self.fail_with(e)),
        }
    }

    fn fail(&self, reason: &str) {
        {
            let mut inner = self.lock();
            if inner.state.is_settled() {
                return;
            }
            inner.last_error = Some(reason.to_string());
        }
        tracing::debug!(item_id = self.id.0, reason, "Item failed");
        let progress = self.progress();
        self.transition(DownloadState::Error, progress);
    }
}
