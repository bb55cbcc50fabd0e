//! Data types for the season harvester
//!
//! This module contains the core data structures passed between discovery,
//! capture, the orchestrator and the ledger.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Non-owning reference to the clickable episode card.
///
/// Holds the absolute episode-detail URL the card links to. It is only
/// meaningful for the page session it was read from and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiHandle(String);

impl UiHandle {
    pub fn new(href: impl Into<String>) -> Self {
        Self(href.into())
    }

    pub fn href(&self) -> &str {
        &self.0
    }
}

/// An episode as seen on the season page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeRef {
    /// Season/episode identifier (e.g., S01E004), unique within a season
    pub code: String,
    /// Title read from the episode card
    pub title: String,
    /// Card reference used to open the episode
    pub ui_handle: UiHandle,
}

/// Manifest URL captured from the browser's network log
#[derive(Debug, Clone)]
pub struct ManifestUrl {
    pub url: String,
    pub captured_at: Instant,
}

/// One request observed by the browser
#[derive(Debug, Clone)]
pub struct NetworkEvent {
    /// HTTP method of the request
    pub method: String,
    /// Full request URL
    pub url: String,
    /// When the collector saw the request
    pub timestamp: Instant,
}

/// Why an episode ended up in the failure log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    ManifestNotFound,
    DownloadError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManifestNotFound => "manifest_not_found",
            Self::DownloadError => "download_error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of one episode's processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Success {
        code: String,
        title: String,
        filename: String,
    },
    Failure {
        code: String,
        title: String,
        reason: FailureReason,
    },
    /// Already in the ledger or finalized on disk
    Skipped { code: String },
}

/// Row of the completed-episodes ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(rename = "EP_CODE")]
    pub code: String,
    #[serde(rename = "Episode Title")]
    pub title: String,
    #[serde(rename = "Filename")]
    pub filename: String,
}

/// Row of the failure log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub code: String,
    pub title: String,
    pub reason: FailureReason,
}

/// Ordered, deduplicated list of episodes discovered for one season
///
/// Insertion order is discovery order. A code seen a second time is ignored,
/// so the first sighting wins.
#[derive(Debug, Clone, Default)]
pub struct SeasonCatalog {
    episodes: Vec<EpisodeRef>,
    codes: HashSet<String>,
    complete: bool,
}

impl SeasonCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an episode unless its code is already known.
    ///
    /// Returns `true` if the episode was new.
    pub fn insert(&mut self, episode: EpisodeRef) -> bool {
        if !self.codes.insert(episode.code.clone()) {
            return false;
        }
        self.episodes.push(episode);
        true
    }

    /// Merge a batch of sightings, returning how many were new
    pub fn merge(&mut self, batch: impl IntoIterator<Item = EpisodeRef>) -> usize {
        batch
            .into_iter()
            .map(|episode| self.insert(episode))
            .filter(|added| *added)
            .count()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EpisodeRef> {
        self.episodes.iter()
    }

    /// Whether discovery stabilized before its step budget ran out
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub(crate) fn mark_complete(&mut self, complete: bool) {
        self.complete = complete;
    }
}

impl<'a> IntoIterator for &'a SeasonCatalog {
    type Item = &'a EpisodeRef;
    type IntoIter = std::slice::Iter<'a, EpisodeRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.episodes.iter()
    }
}

impl FromIterator<EpisodeRef> for SeasonCatalog {
    fn from_iter<I: IntoIterator<Item = EpisodeRef>>(iter: I) -> Self {
        let mut catalog = Self::new();
        catalog.merge(iter);
        catalog.complete = true;
        catalog
    }
}

/// Per-run settings owned by the command-line layer
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Season page URL
    pub base_url: String,
    /// Season number (1-based)
    pub season: u32,
    /// Audio/subtitle language code (e.g., "es")
    pub lang: String,
    /// Directory receiving media files, subtitles, ledger and failure log
    pub out_dir: PathBuf,
    /// Run the browser without a window
    pub headless: bool,
    /// Verbose logging
    pub debug: bool,
}

/// Counts reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Episodes that finalized without a usable subtitle
    pub subtitle_warnings: usize,
    /// The run stopped early on a stop request
    pub interrupted: bool,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &DownloadOutcome) {
        match outcome {
            DownloadOutcome::Success { .. } => self.succeeded += 1,
            DownloadOutcome::Failure { .. } => self.failed += 1,
            DownloadOutcome::Skipped { .. } => self.skipped += 1,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed, {} skipped",
            self.succeeded, self.failed, self.skipped
        )?;
        if self.subtitle_warnings > 0 {
            write!(f, ", {} without subtitles", self.subtitle_warnings)?;
        }
        if self.interrupted {
            write!(f, " (interrupted)")?;
        }
        Ok(())
    }
}
