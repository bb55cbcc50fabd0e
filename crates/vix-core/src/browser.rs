//! Browser session contract
//!
//! The harvester never talks to a browser directly. Discovery and manifest
//! capture drive whatever implements [`BrowserSession`]; the command-line
//! crate provides the Chrome implementation.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{NetworkEvent, UiHandle};

/// What the harvester needs from a live browser page.
///
/// A session is used strictly sequentially, so every method takes
/// `&mut self`. Errors are reported as `HarvestError::Browser`.
#[async_trait]
pub trait BrowserSession: Send {
    /// Load `url` and wait for the navigation to finish
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Document title of the current page
    async fn page_title(&mut self) -> Result<String>;

    /// URL of the current page
    async fn current_url(&mut self) -> Result<String>;

    /// User-Agent string the browser sends
    async fn user_agent(&mut self) -> Result<String>;

    /// Serialized HTML of the current page
    async fn page_html(&mut self) -> Result<String>;

    /// Scroll the window down by a fraction of the viewport height
    async fn scroll_by(&mut self, viewport_fraction: f64) -> Result<()>;

    /// Pick `season` in the season selector.
    ///
    /// Returns `false` when the page has no season selector.
    async fn select_season(&mut self, season: u32) -> Result<bool>;

    /// Labels of the episode-range selector (e.g., "Episodios 1-20"),
    /// empty when the page has none
    async fn range_labels(&mut self) -> Result<Vec<String>>;

    /// Select one entry of the episode-range selector
    async fn select_range(&mut self, label: &str) -> Result<()>;

    /// Open the episode behind a card so its player starts loading
    async fn open_episode(&mut self, handle: &UiHandle) -> Result<()>;

    /// Forget every network event collected so far
    async fn clear_network_log(&mut self) -> Result<()>;

    /// Take the network events collected since the last drain or clear
    async fn drain_network_events(&mut self) -> Result<Vec<NetworkEvent>>;
}
