//! Error types for the season harvester
//!
//! Errors fall in two groups. Per-episode errors (`CaptureTimeout`,
//! `Download`, `Conversion`) end one episode's processing and are recorded
//! in the failure log. Everything touching the ledger or the tool chain
//! itself is fatal, because the resume guarantee depends on it.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Error type for harvester operations
#[derive(Error, Debug)]
pub enum HarvestError {
    /// Discovery ran out of steps before the episode list stopped growing
    #[error("Discovery incomplete: {found} episodes found before the step budget ran out")]
    DiscoveryIncomplete { found: usize },

    /// No manifest request was observed in time
    #[error("No manifest captured for {code} within {waited:?}")]
    CaptureTimeout { code: String, waited: Duration },

    /// The external downloader failed or produced no media file
    #[error("Download failed for {code}: {detail}")]
    Download { code: String, detail: String },

    /// A subtitle file could not be converted
    #[error("Subtitle conversion failed for {}: {detail}", path.display())]
    Conversion { path: PathBuf, detail: String },

    /// Reading or writing a file failed
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Ledger rows could not be encoded or decoded
    #[error("Ledger encoding error: {0}")]
    Csv(#[from] csv::Error),

    /// The browser session reported an error
    #[error("Browser error: {0}")]
    Browser(String),

    /// A required external program is not installed
    #[error("Required tool not found: {0}")]
    ToolMissing(String),

    /// Configuration value is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl HarvestError {
    /// Wrap an I/O error with the path it happened at.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must abort the whole run.
    ///
    /// Ledger and tool-chain problems invalidate every later episode, so
    /// they are escalated instead of being recorded per episode.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Filesystem { .. } | Self::Csv(_) | Self::ToolMissing(_) | Self::InvalidConfig(_)
        )
    }
}

/// Result type alias for harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;
