//! ViX Season Harvester Core Library
//!
//! This crate downloads every episode of a ViX season. A browser session
//! (supplied by the caller) is used to discover the episodes and to catch
//! each episode's DASH manifest request; the media itself is fetched by
//! N_m3u8DL-RE.
//!
//! # Features
//! - Episode discovery across lazy lists and episode ranges
//! - Manifest capture from the browser's network log
//! - WebVTT to SubRip subtitle conversion
//! - Resumable runs backed by a CSV ledger

pub mod browser;
pub mod capture;
pub mod clock;
pub mod config;
pub mod discovery;
pub mod downloader;
pub mod error;
pub mod harvester;
pub mod ledger;
pub mod orchestrator;
pub mod parser;
pub mod process;
pub mod sanitize;
pub mod subtitles;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use browser::BrowserSession;
pub use clock::{Clock, SharedClock, SystemClock};
pub use config::{CaptureSettings, DiscoverySettings, DownloadSettings, HarvestSettings, PageSelectors};
pub use error::{HarvestError, Result};
pub use harvester::Harvester;
pub use ledger::Ledger;
pub use orchestrator::{Orchestrator, StopSignal};
pub use process::{ProcessExit, ProcessRunner, SharedRunner, SystemRunner};
pub use types::{
    DownloadOutcome, EpisodeRef, FailureReason, FailureRecord, LedgerEntry, ManifestUrl, NetworkEvent, RunConfig,
    RunSummary, SeasonCatalog, UiHandle,
};
