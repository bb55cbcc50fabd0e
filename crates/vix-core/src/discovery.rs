//! Episode discovery
//!
//! A ViX season page lists its episodes in a lazy list, optionally split
//! into ranges ("Episodios 1-20", "Episodios 21-40", ...). Discovery selects
//! the season, walks the ranges and scrolls each one until no new episode
//! codes appear, collecting a deduplicated [`SeasonCatalog`].

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::browser::BrowserSession;
use crate::clock::SharedClock;
use crate::config::{DiscoverySettings, PageSelectors};
use crate::error::{HarvestError, Result};
use crate::parser::CardParser;
use crate::types::{EpisodeRef, SeasonCatalog};

/// Collects the episode list of one season
pub struct DiscoveryEngine {
    clock: SharedClock,
    settings: DiscoverySettings,
    parser: CardParser,
    range_label_prefix: String,
}

impl DiscoveryEngine {
    /// Create an engine for the given page markup.
    ///
    /// # Errors
    /// Returns `HarvestError::InvalidConfig` if a card selector is invalid.
    pub fn new(clock: SharedClock, settings: DiscoverySettings, selectors: &PageSelectors) -> Result<Self> {
        Ok(Self {
            clock,
            settings,
            parser: CardParser::new(selectors)?,
            range_label_prefix: selectors.range_label_prefix.clone(),
        })
    }

    /// Discover the episodes of `season` on the page the session shows.
    ///
    /// Never fails. When the step budget runs out or the browser stops
    /// responding, the episodes found so far are returned in a catalog
    /// whose [`is_complete`](SeasonCatalog::is_complete) is `false`.
    ///
    /// # Arguments
    /// * `session` - Browser session on the season page
    /// * `season` - Season number to select
    /// * `max_scrolls` - Maximum scroll or range-selection steps
    pub async fn discover<S>(&self, session: &mut S, season: u32, max_scrolls: u32) -> SeasonCatalog
    where
        S: BrowserSession + ?Sized,
    {
        self.select_season(session, season).await;

        let mut ranges = self.range_labels(session).await;
        if let Some(first) = ranges.pop_front() {
            self.select_range(session, &first).await;
        }

        let mut catalog = SeasonCatalog::new();
        let mut steps = 0u32;
        let mut stabilized = false;

        loop {
            let added = match self.read_visible(session, season).await {
                Ok(batch) => catalog.merge(batch),
                Err(e) => {
                    warn!("Could not read the episode list: {}", e);
                    break;
                }
            };
            debug!("Discovery step {}: {} new, {} total", steps, added, catalog.len());

            if added == 0 && ranges.is_empty() {
                stabilized = true;
                break;
            }
            if steps >= max_scrolls {
                break;
            }
            steps += 1;

            if added == 0 {
                if let Some(label) = ranges.pop_front() {
                    self.select_range(session, &label).await;
                }
                continue;
            }

            if let Err(e) = session.scroll_by(self.settings.scroll_fraction).await {
                warn!("Scrolling failed: {}", e);
                break;
            }
            self.clock.sleep(self.settings.settle_delay()).await;
        }

        catalog.mark_complete(stabilized);
        if stabilized {
            info!("Discovered {} episodes", catalog.len());
        } else {
            warn!(
                "{}; continuing with the partial list",
                HarvestError::DiscoveryIncomplete { found: catalog.len() }
            );
        }
        catalog
    }

    async fn select_season<S>(&self, session: &mut S, season: u32)
    where
        S: BrowserSession + ?Sized,
    {
        match session.select_season(season).await {
            Ok(true) => {
                info!("Selected season {}", season);
                self.clock.sleep(self.settings.settle_delay()).await;
            }
            Ok(false) => info!("No season selector found, assuming a single-season page"),
            Err(e) => warn!("Could not select season {}: {}", season, e),
        }
    }

    async fn range_labels<S>(&self, session: &mut S) -> VecDeque<String>
    where
        S: BrowserSession + ?Sized,
    {
        let labels = match session.range_labels().await {
            Ok(labels) => labels,
            Err(e) => {
                warn!("Could not read episode ranges: {}", e);
                return VecDeque::new();
            }
        };

        let ranges: VecDeque<String> = labels
            .into_iter()
            .map(|label| label.trim().to_string())
            .filter(|label| label.starts_with(&self.range_label_prefix))
            .collect();
        if !ranges.is_empty() {
            info!("Found {} episode ranges", ranges.len());
        }
        ranges
    }

    /// Select a range, logging instead of failing
    async fn select_range<S>(&self, session: &mut S, label: &str)
    where
        S: BrowserSession + ?Sized,
    {
        match session.select_range(label).await {
            Ok(()) => {
                debug!("Selected range '{}'", label);
                self.clock.sleep(self.settings.range_settle_delay()).await;
            }
            Err(e) => warn!("Skipping range '{}': {}", label, e),
        }
    }

    async fn read_visible<S>(&self, session: &mut S, season: u32) -> Result<Vec<EpisodeRef>>
    where
        S: BrowserSession + ?Sized,
    {
        let html = session.page_html().await?;
        let url = session.current_url().await?;
        Ok(self.parser.parse(&html, &url, season))
    }
}
