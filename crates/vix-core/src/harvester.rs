//! Main harvester API
//!
//! This module ties discovery, capture, download and the ledger together
//! behind one entry point: point it at a season page and it downloads
//! every episode not yet in the output directory.

use std::sync::Arc;

use tracing::{info, warn};

use crate::browser::BrowserSession;
use crate::clock::{SharedClock, SystemClock};
use crate::config::HarvestSettings;
use crate::discovery::DiscoveryEngine;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::orchestrator::{Orchestrator, StopSignal};
use crate::parser::series_name;
use crate::process::{SharedRunner, SystemRunner};
use crate::types::{RunConfig, RunSummary};

/// Season harvester
///
/// # Example
/// ```no_run
/// use vix_core::{BrowserSession, Harvester, HarvestSettings, RunConfig};
///
/// # async fn example(session: &mut dyn BrowserSession) -> vix_core::Result<()> {
/// let harvester = Harvester::new(HarvestSettings::default())?;
/// let config = RunConfig {
///     base_url: "https://vix.com/es-es/detail/series-1234".to_string(),
///     season: 1,
///     lang: "es".to_string(),
///     out_dir: "downloads".into(),
///     headless: true,
///     debug: false,
/// };
///
/// let summary = harvester.run(session, &config).await?;
/// println!("{}", summary);
/// # Ok(())
/// # }
/// ```
pub struct Harvester {
    settings: HarvestSettings,
    runner: SharedRunner,
    clock: SharedClock,
    stop: StopSignal,
}

impl Harvester {
    /// Create a harvester that runs the real downloader on the wall clock.
    ///
    /// # Errors
    /// Returns `HarvestError::InvalidConfig` if the settings are unusable.
    pub fn new(settings: HarvestSettings) -> Result<Self> {
        Self::with_collaborators(settings, Arc::new(SystemRunner), Arc::new(SystemClock))
    }

    /// Create a harvester with a custom process runner and clock.
    ///
    /// This is useful for testing.
    pub fn with_collaborators(settings: HarvestSettings, runner: SharedRunner, clock: SharedClock) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            runner,
            clock,
            stop: StopSignal::new(),
        })
    }

    pub fn settings(&self) -> &HarvestSettings {
        &self.settings
    }

    /// Handle that stops the run after the current episode when raised
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Harvest one season.
    ///
    /// Opens the ledger, loads the season page, discovers the episodes and
    /// processes every one that is not already done.
    ///
    /// # Errors
    /// Fatal errors only: the output directory or ledger is unusable, the
    /// season page cannot be loaded, or the downloader is missing. Episode
    /// failures are reported in the returned summary.
    pub async fn run<S>(&self, session: &mut S, config: &RunConfig) -> Result<RunSummary>
    where
        S: BrowserSession + ?Sized,
    {
        let mut ledger = Ledger::open(&config.out_dir)?;
        if ledger.done_count() > 0 {
            info!("Resuming: {} episodes already done", ledger.done_count());
        }

        info!("Opening {}", config.base_url);
        session.navigate(&config.base_url).await?;
        let series = series_name(&session.page_title().await?);
        info!("Series: {}", series);

        let engine = DiscoveryEngine::new(
            self.clock.clone(),
            self.settings.discovery.clone(),
            &self.settings.selectors,
        )?;
        let catalog = engine
            .discover(session, config.season, self.settings.discovery.max_scrolls)
            .await;
        if catalog.is_empty() {
            warn!("No episodes found for season {}", config.season);
            return Ok(RunSummary::default());
        }

        let orchestrator = Orchestrator::new(
            config.clone(),
            &self.settings,
            series,
            self.runner.clone(),
            self.clock.clone(),
        )?
        .with_stop_signal(self.stop.clone());

        orchestrator.run(session, &catalog, &mut ledger).await
    }
}
