//! # playlist-dl
//!
//! Bounded-concurrency download orchestration for ordered media collections.
//!
//! ## Design Philosophy
//!
//! playlist-dl is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Transport-agnostic** - Items bring their own download logic through [`MediaItem`]
//!   or a [`MediaFetcher`] plugged into [`TrackedItem`]
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! A [`DownloadList`] keeps at most `concurrency_limit` items downloading at a
//! time, admits the next idle item as slots free up, and folds every item's
//! state and progress into one aggregate status.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use playlist_dl::{Collection, Config, DownloadList, MediaItem};
//!
//! # fn items() -> Vec<Arc<dyn MediaItem>> { Vec::new() }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let collection = Collection::with_items(items());
//!     let list = DownloadList::new(collection, Config::default().with_concurrency_limit(2))?;
//!
//!     // Subscribe to events
//!     let mut events = list.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     list.start(false);
//!     let state = list.wait_settled().await?;
//!     println!("List ended in {}", state);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Ordered item collection with aggregate bookkeeping
pub mod collection;
/// Configuration types
pub mod config;
/// Bounded-concurrency scheduler
pub mod download_list;
/// Error types
pub mod error;
/// Item contract and reference implementation
pub mod item;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use collection::{Collection, ItemSubscriptions};
pub use config::Config;
pub use download_list::{DownloadList, DownloadListBuilder, EventHandler};
pub use error::{Error, Result};
pub use item::{
    ListenerSet, MediaFetcher, MediaItem, MetadataListener, MetadataNotification,
    ProgressReporter, StatusListener, StatusNotification, Subscription, TrackedItem,
};
pub use types::{
    DownloadState, Event, ExecutionStatus, ItemId, ListId, ListSnapshot, MediaMetadata,
    MediaType,
};
