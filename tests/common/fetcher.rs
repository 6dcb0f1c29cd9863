//! Scripted transport for driving items step by step

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use playlist_dl::{Error, MediaFetcher, MediaMetadata, MediaType, ProgressReporter, Result};
use tokio::sync::{Mutex, mpsc};

/// One step of a scripted fetch
#[derive(Clone, Debug)]
pub enum Step {
    /// Report this progress fraction
    Progress(f64),
    /// Complete successfully
    Finish,
    /// Fail with this message
    Fail(String),
}

/// Test-side handle feeding steps to a [`ScriptedFetcher`]
#[derive(Clone)]
pub struct FetchControl {
    steps: mpsc::UnboundedSender<Step>,
}

impl FetchControl {
    /// Queue a progress report
    pub fn progress(&self, fraction: f64) -> &Self {
        self.steps.send(Step::Progress(fraction)).ok();
        self
    }

    /// Queue successful completion
    pub fn finish(&self) {
        self.steps.send(Step::Finish).ok();
    }

    /// Queue a failure
    pub fn fail(&self, message: &str) {
        self.steps.send(Step::Fail(message.to_string())).ok();
    }
}

/// Fetches running at once, shared by every fetcher that tracks it
#[derive(Debug, Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Highest number of concurrent fetches seen
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Fetches running right now
    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    fn enter(self: &Arc<Self>) -> InFlightGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard(self.clone())
    }
}

struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A [`MediaFetcher`] whose fetch blocks on steps queued through a [`FetchControl`]
pub struct ScriptedFetcher {
    metadata: MediaMetadata,
    present: bool,
    resolve_error: Option<String>,
    steps: Mutex<mpsc::UnboundedReceiver<Step>>,
    fetches: AtomicUsize,
    in_flight: Option<Arc<InFlight>>,
}

impl ScriptedFetcher {
    /// Fetcher resolving metadata with `title` and `channel`
    pub fn new(title: &str, channel: &str) -> (Self, FetchControl) {
        let (tx, rx) = mpsc::unbounded_channel();
        let fetcher = Self {
            metadata: MediaMetadata {
                title: title.to_string(),
                channel_name: Some(channel.to_string()),
                download_url: None,
                duration_secs: Some(180),
                extension: "mp4".to_string(),
            },
            present: false,
            resolve_error: None,
            steps: Mutex::new(rx),
            fetches: AtomicUsize::new(0),
            in_flight: None,
        };
        (fetcher, FetchControl { steps: tx })
    }

    /// Report the media as already downloaded
    pub fn already_present(mut self) -> Self {
        self.present = true;
        self
    }

    /// Resolve to a different title than the item starts with
    pub fn resolving_title(mut self, title: &str) -> Self {
        self.metadata.title = title.to_string();
        self
    }

    /// Fail metadata resolution
    pub fn failing_resolve(mut self, message: &str) -> Self {
        self.resolve_error = Some(message.to_string());
        self
    }

    /// Count this fetcher's running fetches in `in_flight`
    pub fn tracking(mut self, in_flight: &Arc<InFlight>) -> Self {
        self.in_flight = Some(in_flight.clone());
        self
    }

    /// Number of fetches started
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaFetcher for ScriptedFetcher {
    async fn resolve(&self, media_type: MediaType) -> Result<MediaMetadata> {
        if let Some(message) = &self.resolve_error {
            return Err(Error::Fetch(message.clone()));
        }
        let mut metadata = self.metadata.clone();
        if media_type == MediaType::Audio {
            metadata.extension = "m4a".to_string();
        }
        Ok(metadata)
    }

    async fn is_downloaded(&self, _metadata: &MediaMetadata, _media_type: MediaType) -> bool {
        self.present
    }

    async fn fetch(
        &self,
        _metadata: &MediaMetadata,
        _media_type: MediaType,
        progress: ProgressReporter<'_>,
    ) -> Result<()> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let _running = self.in_flight.as_ref().map(InFlight::enter);
        let mut steps = self.steps.lock().await;
        loop {
            match steps.recv().await {
                Some(Step::Progress(fraction)) => progress.report(fraction),
                Some(Step::Finish) => return Ok(()),
                Some(Step::Fail(message)) => return Err(Error::Fetch(message)),
                None => return Err(Error::Fetch("script ended".to_string())),
            }
        }
    }
}
