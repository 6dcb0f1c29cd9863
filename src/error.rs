//! Error types for playlist-dl
//!
//! The scheduler never reports failures through `Result`: an item that fails
//! surfaces as an `Error` state on the event channel. The types here cover the
//! edges that do return errors: configuration loading, the item download
//! contract, and queries against a list whose driver has stopped.

use crate::types::ItemId;
use thiserror::Error;

/// Result type alias for playlist-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for playlist-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "concurrency_limit")
        key: Option<String>,
    },

    /// An item's download failed
    #[error("item {id} failed: {message}")]
    Item {
        /// The item that failed
        id: ItemId,
        /// What went wrong
        message: String,
    },

    /// Transport or metadata extraction failure reported by a fetcher
    #[error("fetch error: {0}")]
    Fetch(String),

    /// The list's driver task has stopped and can no longer answer
    #[error("download list is closed")]
    ListClosed,

    /// No async runtime was available to run a list driver
    #[error("runtime error: {0}")]
    Runtime(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a configuration error tied to a key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Configuration key responsible for this error, if any
    pub fn config_key(&self) -> Option<&str> {
        match self {
            Error::Config { key, .. } => key.as_deref(),
            _ => None,
        }
    }
}
