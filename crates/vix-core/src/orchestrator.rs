//! Download orchestrator
//!
//! Walks a [`SeasonCatalog`] episode by episode. Each episode moves through
//! a small state machine: skip if already done, capture the manifest, run
//! the downloader, convert the subtitle and record the result in the
//! ledger. Episode failures are recorded and the run moves on; ledger and
//! tool-chain errors end the run.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::browser::BrowserSession;
use crate::capture::ManifestCapture;
use crate::clock::SharedClock;
use crate::config::{DownloadSettings, HarvestSettings};
use crate::downloader::{DownloadRequest, OutputPaths};
use crate::error::{HarvestError, Result};
use crate::ledger::Ledger;
use crate::parser::{heading_replaces_title, EpisodeHeading};
use crate::process::SharedRunner;
use crate::subtitles;
use crate::types::{
    DownloadOutcome, EpisodeRef, FailureReason, FailureRecord, LedgerEntry, ManifestUrl, RunConfig,
    RunSummary, SeasonCatalog,
};

/// Cooperative stop request, checked between episodes
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop after the current episode
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Processing state of one episode
#[derive(Debug)]
enum EpisodeState {
    Pending,
    CaptureManifest,
    Downloading(ManifestUrl),
    Converting,
    Finalizing(SubtitleStatus),
    Done,
    Failed(FailureReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubtitleStatus {
    Converted,
    Missing,
    ConversionFailed,
}

/// Runs the per-episode pipeline over a catalog
pub struct Orchestrator {
    config: RunConfig,
    download: DownloadSettings,
    series: String,
    capture: ManifestCapture,
    heading: EpisodeHeading,
    runner: SharedRunner,
    clock: SharedClock,
    stop: StopSignal,
}

impl Orchestrator {
    /// Create an orchestrator for one season.
    ///
    /// # Arguments
    /// * `config` - Per-run settings (output directory, language)
    /// * `settings` - Capture and download tunables
    /// * `series` - Sanitized series name used in output file names
    /// * `runner` - Runs the external downloader
    /// * `clock` - Time source for polling and pauses
    pub fn new(
        config: RunConfig,
        settings: &HarvestSettings,
        series: impl Into<String>,
        runner: SharedRunner,
        clock: SharedClock,
    ) -> Result<Self> {
        Ok(Self {
            capture: ManifestCapture::from_settings(clock.clone(), &settings.capture)?,
            heading: EpisodeHeading::new(&settings.selectors.episode_heading)?,
            config,
            download: settings.download.clone(),
            series: series.into(),
            runner,
            clock,
            stop: StopSignal::new(),
        })
    }

    /// Use `stop` to end the run early
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Process every episode of `catalog` in order.
    ///
    /// # Returns
    /// Counts of succeeded, failed and skipped episodes.
    ///
    /// # Errors
    /// Only fatal errors end the run early: an unwritable ledger or failure
    /// log, or a downloader that cannot be found.
    pub async fn run<S>(&self, session: &mut S, catalog: &SeasonCatalog, ledger: &mut Ledger) -> Result<RunSummary>
    where
        S: BrowserSession + ?Sized,
    {
        let total = catalog.len();
        let mut summary = RunSummary::default();

        for (index, episode) in catalog.iter().enumerate() {
            if self.stop.is_raised() {
                warn!("Stop requested, {} episodes left for the next run", total - index);
                summary.interrupted = true;
                break;
            }

            let span = info_span!("episode", code = %episode.code);
            let outcome = self
                .process_episode(session, episode, ledger, &mut summary, index + 1, total)
                .instrument(span)
                .await?;
            summary.record(&outcome);

            let skipped = matches!(outcome, DownloadOutcome::Skipped { .. });
            if !skipped && index + 1 < total && !self.stop.is_raised() {
                self.clock.sleep(self.download.episode_pause()).await;
            }
        }

        info!("Run finished: {}", summary);
        Ok(summary)
    }

    async fn process_episode<S>(
        &self,
        session: &mut S,
        episode: &EpisodeRef,
        ledger: &mut Ledger,
        summary: &mut RunSummary,
        position: usize,
        total: usize,
    ) -> Result<DownloadOutcome>
    where
        S: BrowserSession + ?Sized,
    {
        let paths = OutputPaths::new(&self.config.out_dir, &self.series, episode, &self.config.lang);
        let mut title = episode.title.clone();
        let mut state = EpisodeState::Pending;

        loop {
            debug!("State: {:?}", state);
            state = match state {
                EpisodeState::Pending => {
                    if ledger.is_done(&episode.code) || paths.media.exists() {
                        info!("[{}/{}] Already downloaded, skipping", position, total);
                        return Ok(DownloadOutcome::Skipped {
                            code: episode.code.clone(),
                        });
                    }
                    info!("[{}/{}] {}", position, total, episode.title);
                    EpisodeState::CaptureManifest
                }

                EpisodeState::CaptureManifest => {
                    let captured = self.capture.capture(session, &episode.ui_handle, &episode.code).await;
                    if let Some(heading) = self.watch_page_heading(session).await {
                        if heading_replaces_title(&heading, &title) {
                            warn!("Page title '{}' differs from card title '{}', using the page title", heading, title);
                            title = heading;
                        }
                    }
                    match captured {
                        Ok(manifest) => {
                            info!("Manifest: {}", manifest.url);
                            EpisodeState::Downloading(manifest)
                        }
                        Err(e) => {
                            error!("{}", e);
                            EpisodeState::Failed(FailureReason::ManifestNotFound)
                        }
                    }
                }

                EpisodeState::Downloading(manifest) => {
                    match self.download(session, &manifest, &paths, &episode.code).await {
                        Ok(()) => EpisodeState::Converting,
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            error!("{}", e);
                            EpisodeState::Failed(FailureReason::DownloadError)
                        }
                    }
                }

                EpisodeState::Converting => EpisodeState::Finalizing(self.convert_subtitles(&paths)),

                EpisodeState::Finalizing(subtitles) => {
                    if !paths.media.exists() {
                        error!("{} disappeared before finalizing", paths.media.display());
                        EpisodeState::Failed(FailureReason::DownloadError)
                    } else {
                        if subtitles == SubtitleStatus::Converted {
                            remove_vtt_leftovers(&self.config.out_dir, &paths.stem);
                        } else {
                            summary.subtitle_warnings += 1;
                        }
                        EpisodeState::Done
                    }
                }

                EpisodeState::Done => {
                    let filename = paths.media_file_name();
                    ledger.record_success(&LedgerEntry {
                        code: episode.code.clone(),
                        title: title.clone(),
                        filename: filename.clone(),
                    })?;
                    info!("Saved {}", filename);
                    return Ok(DownloadOutcome::Success {
                        code: episode.code.clone(),
                        title,
                        filename,
                    });
                }

                EpisodeState::Failed(reason) => {
                    ledger.record_failure(&FailureRecord {
                        code: episode.code.clone(),
                        title: title.clone(),
                        reason,
                    })?;
                    return Ok(DownloadOutcome::Failure {
                        code: episode.code.clone(),
                        title,
                        reason,
                    });
                }
            };
        }
    }

    async fn download<S>(&self, session: &mut S, manifest: &ManifestUrl, paths: &OutputPaths, code: &str) -> Result<()>
    where
        S: BrowserSession + ?Sized,
    {
        let user_agent = session.user_agent().await.unwrap_or_else(|e| {
            debug!("No user agent: {}", e);
            String::new()
        });
        let referer = session.current_url().await.unwrap_or_else(|e| {
            debug!("No referer: {}", e);
            String::new()
        });

        let args = DownloadRequest::new(
            manifest.url.as_str(),
            self.config.out_dir.as_path(),
            paths.stem.as_str(),
            self.config.lang.as_str(),
            self.download.thread_count,
        )
        .header("User-Agent", &user_agent)
        .header("Referer", &referer)
        .args();

        let exit = self.runner.run(&self.download.downloader, &args).await?;
        if !exit.success() {
            return Err(HarvestError::Download {
                code: code.to_string(),
                detail: format!("{} finished with {}", self.download.downloader, exit),
            });
        }
        if !paths.media.exists() {
            return Err(HarvestError::Download {
                code: code.to_string(),
                detail: format!("{} was not created", paths.media.display()),
            });
        }
        Ok(())
    }

    /// Episode title shown on the page the capture opened
    async fn watch_page_heading<S>(&self, session: &mut S) -> Option<String>
    where
        S: BrowserSession + ?Sized,
    {
        match session.page_html().await {
            Ok(html) => self.heading.parse(&html),
            Err(e) => {
                debug!("Could not read the episode page: {}", e);
                None
            }
        }
    }

    fn convert_subtitles(&self, paths: &OutputPaths) -> SubtitleStatus {
        if !paths.subtitle_vtt.exists() {
            warn!("No '{}' subtitle track, keeping the video without subtitles", self.config.lang);
            return SubtitleStatus::Missing;
        }
        match subtitles::convert(&paths.subtitle_vtt) {
            Ok(srt) => {
                debug!("Subtitle written to {}", srt.display());
                SubtitleStatus::Converted
            }
            Err(e) => {
                warn!("{}; keeping the .vtt file", e);
                SubtitleStatus::ConversionFailed
            }
        }
    }
}

/// Remove `.vtt` files the downloader left for `stem`
fn remove_vtt_leftovers(out_dir: &Path, stem: &str) {
    let entries = match std::fs::read_dir(out_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Could not list {}: {}", out_dir.display(), e);
            return;
        }
    };

    for path in entries.filter_map(|entry| entry.ok()).map(|entry| entry.path()) {
        let is_leftover = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("vtt"))
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&format!("{}.", stem)));
        if is_leftover {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("Could not remove {}: {}", path.display(), e);
            }
        }
    }
}
