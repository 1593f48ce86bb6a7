//! Merger configuration.
//!
//! Loadable from YAML:
//!
//! ```yaml
//! first_streamable_block: 1
//! stop_block: 17000000
//! enforce_bundle_size: true
//! pipe_capacity: 16
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipe::DEFAULT_PIPE_CAPACITY;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Immutable merger settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MergerConfig {
    /// Earliest valid block of the chain. Only used to validate the first
    /// block when it is not on a bundle boundary.
    pub first_streamable_block: u64,

    /// Exclusive upper bound; the first block at or past it ends the stream.
    /// `None` (or 0) streams forever.
    pub stop_block: Option<u64>,

    /// Fail when a completed bundle (other than the first) does not hold
    /// exactly 100 blocks.
    pub enforce_bundle_size: bool,

    /// Chunks buffered between the serializer and the store.
    pub pipe_capacity: usize,
}

impl Default for MergerConfig {
    fn default() -> Self {
        Self {
            first_streamable_block: 0,
            stop_block: None,
            enforce_bundle_size: true,
            pipe_capacity: DEFAULT_PIPE_CAPACITY,
        }
    }
}

impl MergerConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn with_first_streamable_block(mut self, block: u64) -> Self {
        self.first_streamable_block = block;
        self
    }

    pub fn with_stop_block(mut self, stop_block: Option<u64>) -> Self {
        self.stop_block = stop_block;
        self
    }

    pub fn with_enforce_bundle_size(mut self, enforce: bool) -> Self {
        self.enforce_bundle_size = enforce;
        self
    }

    /// Stop block with the legacy "0 means unset" rule applied.
    pub fn effective_stop_block(&self) -> Option<u64> {
        self.stop_block.filter(|stop| *stop > 0)
    }
}
