//! Hand-driven item for scheduler tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::item::{
    ListenerSet, MediaItem, MetadataListener, MetadataNotification, StatusListener,
    StatusNotification, Subscription,
};
use crate::types::{DownloadState, ItemId, MediaMetadata, MediaType};

/// What `download` does once called
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) enum Behavior {
    /// Park until the test settles the item through [`ManualItem::set`]
    #[default]
    WaitUntilSettled,
    /// Go straight to `Ready` at full progress
    ReadyImmediately,
    /// Return an error without touching state
    ReturnError,
    /// Panic inside the download
    Panic,
    /// Return `Ok` without touching state
    ReturnImmediately,
}

#[derive(Debug)]
struct Inner {
    title: String,
    channel: Option<String>,
    state: DownloadState,
    progress: f64,
    behavior: Behavior,
    fail_reasons: Vec<String>,
    download_args: Option<(MediaType, bool)>,
}

/// A [`MediaItem`] whose transitions are driven by the test
pub(crate) struct ManualItem {
    id: ItemId,
    inner: Mutex<Inner>,
    status: ListenerSet<StatusNotification>,
    metadata: ListenerSet<MetadataNotification>,
    downloads: AtomicUsize,
    settled: watch::Sender<bool>,
}

#[allow(clippy::unwrap_used)]
impl ManualItem {
    pub(crate) fn new(id: u64, title: &str) -> Arc<Self> {
        let (settled, _) = watch::channel(false);
        Arc::new(Self {
            id: ItemId(id),
            inner: Mutex::new(Inner {
                title: title.to_string(),
                channel: None,
                state: DownloadState::Initialized,
                progress: 0.0,
                behavior: Behavior::default(),
                fail_reasons: Vec::new(),
                download_args: None,
            }),
            status: ListenerSet::new(),
            metadata: ListenerSet::new(),
            downloads: AtomicUsize::new(0),
            settled,
        })
    }

    pub(crate) fn with_channel(self: Arc<Self>, channel: &str) -> Arc<Self> {
        self.inner.lock().unwrap().channel = Some(channel.to_string());
        self
    }

    pub(crate) fn with_behavior(self: Arc<Self>, behavior: Behavior) -> Arc<Self> {
        self.inner.lock().unwrap().behavior = behavior;
        self
    }

    /// Move to `state` at `progress` and notify listeners
    pub(crate) fn set(&self, state: DownloadState, progress: f64) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.state = state;
            inner.progress = progress;
        }
        if state.is_settled() {
            self.settled.send_replace(true);
        }
        self.status.notify(StatusNotification {
            item: self.id,
            state,
            progress,
        });
    }

    /// Change the title without notifying
    pub(crate) fn set_title(&self, title: &str) {
        self.inner.lock().unwrap().title = title.to_string();
    }

    pub(crate) fn publish_metadata(&self, metadata: MediaMetadata) {
        self.metadata.notify(MetadataNotification {
            item: self.id,
            metadata,
        });
    }

    pub(crate) fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_calls(&self) -> usize {
        self.inner.lock().unwrap().fail_reasons.len()
    }

    pub(crate) fn last_fail_reason(&self) -> Option<String> {
        self.inner.lock().unwrap().fail_reasons.last().cloned()
    }

    pub(crate) fn last_download_args(&self) -> Option<(MediaType, bool)> {
        self.inner.lock().unwrap().download_args
    }

    pub(crate) fn status_listener_count(&self) -> usize {
        self.status.len()
    }

    /// Wait until `download` has been called `count` times
    pub(crate) async fn wait_for_downloads(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.download_count() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }
}

#[allow(clippy::unwrap_used)]
#[async_trait]
impl MediaItem for ManualItem {
    fn id(&self) -> ItemId {
        self.id
    }

    fn title(&self) -> String {
        self.inner.lock().unwrap().title.clone()
    }

    fn channel_name(&self) -> Option<String> {
        self.inner.lock().unwrap().channel.clone()
    }

    fn state(&self) -> DownloadState {
        self.inner.lock().unwrap().state
    }

    fn progress(&self) -> f64 {
        self.inner.lock().unwrap().progress
    }

    fn subscribe_status(&self, listener: StatusListener) -> Subscription {
        self.status.subscribe(listener)
    }

    fn subscribe_metadata(&self, listener: MetadataListener) -> Subscription {
        self.metadata.subscribe(listener)
    }

    async fn download(&self, media_type: MediaType, skip_if_downloaded: bool) -> Result<()> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let behavior = {
            let mut inner = self.inner.lock().unwrap();
            inner.download_args = Some((media_type, skip_if_downloaded));
            inner.behavior
        };

        match behavior {
            Behavior::WaitUntilSettled => {
                let mut settled = self.settled.subscribe();
                settled.wait_for(|done| *done).await.ok();
                Ok(())
            }
            Behavior::ReadyImmediately => {
                self.set(DownloadState::Ready, 1.0);
                Ok(())
            }
            Behavior::ReturnError => Err(Error::Item {
                id: self.id,
                message: "boom".into(),
            }),
            Behavior::Panic => panic!("download exploded"),
            Behavior::ReturnImmediately => Ok(()),
        }
    }

    fn fail(&self, reason: &str) {
        let (state, progress) = {
            let mut inner = self
                .inner
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            inner.fail_reasons.push(reason.to_string());
            (inner.state, inner.progress)
        };
        if !state.is_settled() {
            self.set(DownloadState::Error, progress);
        }
    }
}
