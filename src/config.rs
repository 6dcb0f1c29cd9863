//! Configuration types for playlist-dl

use crate::error::{Error, Result};
use crate::types::MediaType;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a [`DownloadList`](crate::DownloadList)
///
/// Fixed for the lifetime of the list it is handed to.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Media format every item downloads (default: video)
    #[serde(default)]
    pub media_type: MediaType,

    /// Maximum number of items downloading at once (default: 3)
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Capacity of the event broadcast channel (default: 1000)
    ///
    /// A subscriber that falls behind by more than this many events receives
    /// `RecvError::Lagged`.
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            media_type: MediaType::default(),
            concurrency_limit: default_concurrency_limit(),
            event_buffer_size: default_event_buffer_size(),
        }
    }
}

impl Config {
    /// Config for the given media type with every other setting at its default
    pub fn for_media(media_type: MediaType) -> Self {
        Self {
            media_type,
            ..Self::default()
        }
    }

    /// Builder-style override of the concurrency limit
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    /// Check that every setting is usable
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending key if the concurrency
    /// limit or the event buffer size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency_limit == 0 {
            return Err(Error::config(
                "concurrency_limit",
                "concurrency_limit must be at least 1",
            ));
        }
        if self.event_buffer_size == 0 {
            return Err(Error::config(
                "event_buffer_size",
                "event_buffer_size must be at least 1",
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON config document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config '{}': {}", path.display(), e),
            ))
        })?;
        let config = Self::from_json_str(&raw)?;
        tracing::debug!(
            path = %path.display(),
            media_type = %config.media_type,
            concurrency_limit = config.concurrency_limit,
            "Loaded download list config"
        );
        Ok(config)
    }
}

// Default value functions
fn default_concurrency_limit() -> usize {
    3
}

fn default_event_buffer_size() -> usize {
    1000
}
