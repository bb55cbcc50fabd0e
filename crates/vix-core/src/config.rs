//! Harvester tunables
//!
//! Everything the components need besides the per-run [`RunConfig`] lives
//! here, grouped by component. All groups deserialize with defaults so a
//! settings file only has to name what it changes.
//!
//! [`RunConfig`]: crate::types::RunConfig

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};

/// All harvester tunables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestSettings {
    pub discovery: DiscoverySettings,
    pub capture: CaptureSettings,
    pub download: DownloadSettings,
    pub selectors: PageSelectors,
}

impl HarvestSettings {
    /// Check values that would make a component loop forever or never match.
    pub fn validate(&self) -> Result<()> {
        if self.discovery.max_scrolls == 0 {
            return Err(HarvestError::InvalidConfig(
                "discovery.max_scrolls must be at least 1".to_string(),
            ));
        }
        if !(self.discovery.scroll_fraction > 0.0 && self.discovery.scroll_fraction <= 1.0) {
            return Err(HarvestError::InvalidConfig(format!(
                "discovery.scroll_fraction must be in (0, 1], got {}",
                self.discovery.scroll_fraction
            )));
        }
        if self.capture.poll_interval_ms == 0 {
            return Err(HarvestError::InvalidConfig(
                "capture.poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.capture.timeout_secs == 0 {
            return Err(HarvestError::InvalidConfig(
                "capture.timeout_secs must be positive".to_string(),
            ));
        }
        if self.download.thread_count == 0 {
            return Err(HarvestError::InvalidConfig(
                "download.thread_count must be positive".to_string(),
            ));
        }
        if self.download.downloader.trim().is_empty() {
            return Err(HarvestError::InvalidConfig(
                "download.downloader must name a program".to_string(),
            ));
        }
        Ok(())
    }
}

/// Episode discovery tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Maximum scroll or range-selection steps (default: 60)
    pub max_scrolls: u32,
    /// Wait after a scroll for lazy rows to render, in ms (default: 2000)
    pub settle_delay_ms: u64,
    /// Wait after selecting an episode range, in ms (default: 3000)
    pub range_settle_delay_ms: u64,
    /// Share of the viewport height scrolled per step (default: 0.8)
    pub scroll_fraction: f64,
}

impl DiscoverySettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn range_settle_delay(&self) -> Duration {
        Duration::from_millis(self.range_settle_delay_ms)
    }
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            max_scrolls: 60,
            settle_delay_ms: 2000,
            range_settle_delay_ms: 3000,
            scroll_fraction: 0.8,
        }
    }
}

/// Manifest capture tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Upper bound on the wait for a manifest request, in seconds (default: 45)
    pub timeout_secs: u64,
    /// Network log sampling interval, in ms (default: 300)
    pub poll_interval_ms: u64,
    /// Regex a manifest request URL must match
    pub manifest_pattern: String,
    /// Case-insensitive substrings that disqualify a manifest URL
    pub exclude_patterns: Vec<String>,
}

impl CaptureSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 45,
            poll_interval_ms: 300,
            manifest_pattern: r"(?i)\.mpd\b".to_string(),
            exclude_patterns: vec!["trailer".to_string(), "preview".to_string()],
        }
    }
}

/// External downloader tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// Downloader executable (default: N_m3u8DL-RE, looked up on PATH)
    pub downloader: String,
    /// Segment download threads (default: 8)
    pub thread_count: u32,
    /// Pause between episodes, in ms (default: 2000)
    pub episode_pause_ms: u64,
}

impl DownloadSettings {
    pub fn episode_pause(&self) -> Duration {
        Duration::from_millis(self.episode_pause_ms)
    }
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            downloader: "N_m3u8DL-RE".to_string(),
            thread_count: 8,
            episode_pause_ms: 2000,
        }
    }
}

/// CSS selectors and labels for the season page markup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSelectors {
    /// Button opening the season list
    pub season_button: String,
    /// Entries of the season list
    pub season_option: String,
    /// Button opening the episode-range list
    pub range_button: String,
    /// Entries of the episode-range list
    pub range_option: String,
    /// Only range entries starting with this label are used
    pub range_label_prefix: String,
    /// Container holding the episode cards
    pub card_container: String,
    /// Link inside each episode card
    pub card_link: String,
    /// Episode title on the watch page
    pub episode_heading: String,
}

impl Default for PageSelectors {
    fn default() -> Self {
        Self {
            season_button: r#"button[aria-haspopup="listbox"]"#.to_string(),
            season_option: r#"[role="option"], li"#.to_string(),
            range_button: r#"button[aria-label="Selected Item"]"#.to_string(),
            range_option: r#"ul[role="listbox"] div[role="button"]"#.to_string(),
            range_label_prefix: "Episodios".to_string(),
            card_container: r#"div[class*="ContentList_container"]"#.to_string(),
            card_link: r#"a[class*="Card_link"][href]"#.to_string(),
            episode_heading: "h1, h2".to_string(),
        }
    }
}
