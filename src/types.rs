//! Core types for playlist-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

/// Unique identifier for an item inside a collection
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl ItemId {
    /// Create a new ItemId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ItemId> for u64 {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ItemId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Process-wide counter backing [`ListId::next`]
static NEXT_LIST_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of a download list, attached to every event it emits
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListId(pub u64);

impl ListId {
    /// Allocate the next unused list id
    pub fn next() -> Self {
        Self(NEXT_LIST_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ListId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Download state, shared by items and by the aggregate of a list
///
/// Items walk `Initialized -> InProgress -> {ProgressChanged, TitleChanged}* -> Ready | Error`
/// and may report `Removed` at any point. The aggregate walks
/// `Initialized -> BatchStarted -> ... -> AllFinished | Removed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    /// Created, not yet started
    #[default]
    Initialized,
    /// A list has started working through its items
    BatchStarted,
    /// Download started
    InProgress,
    /// Download progress moved
    ProgressChanged,
    /// Title was re-resolved from metadata
    TitleChanged,
    /// Finished successfully
    Ready,
    /// Finished with a failure
    Error,
    /// Left its collection (cancelled by the user or deleted)
    Removed,
    /// Every item of a list reached `Ready` or `Error`
    AllFinished,
}

impl DownloadState {
    /// `Ready` or `Error`
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadState::Ready | DownloadState::Error)
    }

    /// Terminal, or removed from its collection. Nothing more will happen to the item.
    pub fn is_settled(&self) -> bool {
        self.is_terminal() || *self == DownloadState::Removed
    }

    /// Non-idle and non-terminal, i.e. currently occupying a concurrency slot
    pub fn is_active(&self) -> bool {
        !self.is_settled() && *self != DownloadState::Initialized
    }
}

impl std::fmt::Display for DownloadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DownloadState::Initialized => "initialized",
            DownloadState::BatchStarted => "batch_started",
            DownloadState::InProgress => "in_progress",
            DownloadState::ProgressChanged => "progress_changed",
            DownloadState::TitleChanged => "title_changed",
            DownloadState::Ready => "ready",
            DownloadState::Error => "error",
            DownloadState::Removed => "removed",
            DownloadState::AllFinished => "all_finished",
        };
        f.write_str(s)
    }
}

/// Lifecycle flag of a collection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Collection is live
    #[default]
    Active,
    /// Collection was deleted; its items are gone
    Deleted,
}

/// Media format selector handed to every item download
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Audio track only
    Audio,
    /// Full video (default)
    #[default]
    Video,
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Audio => f.write_str("audio"),
            MediaType::Video => f.write_str("video"),
        }
    }
}

impl std::str::FromStr for MediaType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "audio" => Ok(MediaType::Audio),
            "video" => Ok(MediaType::Video),
            other => Err(crate::error::Error::Config {
                message: format!("unknown media type '{other}' (expected 'audio' or 'video')"),
                key: Some("media_type".to_string()),
            }),
        }
    }
}

/// Metadata resolved for an item, available before its download completes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Resolved media title
    pub title: String,
    /// Channel or uploader the media belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    /// Direct location of the selected stream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<Url>,
    /// Duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    /// Container extension of the selected stream (e.g. "mp4", "m4a")
    pub extension: String,
}

/// Event emitted by a download list
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Aggregate state/progress of the list changed
    StatusChanged {
        /// List that emitted the event
        list: ListId,
        /// Current aggregate title
        title: String,
        /// Item whose notification triggered the update (None for batch start and delete)
        #[serde(skip_serializing_if = "Option::is_none")]
        item: Option<ItemId>,
        /// Aggregate state
        state: DownloadState,
        /// Aggregate progress in [0, 1]
        progress: f64,
    },

    /// An item resolved its metadata
    MetadataAvailable {
        /// List that owns the item
        list: ListId,
        /// Item that resolved metadata
        item: ItemId,
        /// The resolved metadata
        metadata: MediaMetadata,
        /// Media format the list downloads
        media_type: MediaType,
    },
}

impl Event {
    /// Aggregate state carried by a `StatusChanged` event
    pub fn state(&self) -> Option<DownloadState> {
        match self {
            Event::StatusChanged { state, .. } => Some(*state),
            Event::MetadataAvailable { .. } => None,
        }
    }

    /// Item attached to the event, if any
    pub fn item(&self) -> Option<ItemId> {
        match self {
            Event::StatusChanged { item, .. } => *item,
            Event::MetadataAvailable { item, .. } => Some(*item),
        }
    }
}

/// Point-in-time view of a download list
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListSnapshot {
    /// List id
    pub id: ListId,
    /// Aggregate title
    pub title: String,
    /// Aggregate state
    pub state: DownloadState,
    /// Aggregate progress in [0, 1]
    pub progress: f64,
    /// Active or deleted
    pub execution_status: ExecutionStatus,
    /// Items still in the collection
    pub item_count: usize,
    /// Items occupying a concurrency slot (including dispatched items that have not reported yet)
    pub active_count: usize,
    /// Items in `Ready` or `Error`
    pub finished_count: usize,
    /// When `start` last began a batch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}
