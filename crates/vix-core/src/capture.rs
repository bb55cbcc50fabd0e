//! Manifest capture
//!
//! Opening an episode makes the player request its DASH manifest. The
//! capture clears the browser's network log, opens the episode and polls
//! the log until a manifest request shows up or the timeout passes.

use std::time::Duration;

use regex_lite::Regex;
use tracing::debug;

use crate::browser::BrowserSession;
use crate::clock::SharedClock;
use crate::config::CaptureSettings;
use crate::error::{HarvestError, Result};
use crate::types::{ManifestUrl, NetworkEvent, UiHandle};

/// Decides which network requests are episode manifests
#[derive(Debug, Clone)]
pub struct ManifestMatcher {
    pattern: Regex,
    exclude: Vec<String>,
}

impl ManifestMatcher {
    /// Build a matcher from a URL pattern and disqualifying substrings.
    ///
    /// # Errors
    /// Returns `HarvestError::InvalidConfig` if `pattern` is not a valid regex.
    pub fn new(pattern: &str, exclude: &[String]) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            HarvestError::InvalidConfig(format!("invalid manifest pattern '{}': {}", pattern, e))
        })?;
        Ok(Self {
            pattern,
            exclude: exclude.iter().map(|s| s.to_lowercase()).collect(),
        })
    }

    pub fn from_settings(settings: &CaptureSettings) -> Result<Self> {
        Self::new(&settings.manifest_pattern, &settings.exclude_patterns)
    }

    /// Whether `event` is a request for an episode manifest.
    ///
    /// CORS preflights and URLs containing an excluded substring (trailers,
    /// previews) never match.
    pub fn matches(&self, event: &NetworkEvent) -> bool {
        if event.method.eq_ignore_ascii_case("OPTIONS") {
            return false;
        }
        if !self.pattern.is_match(&event.url) {
            return false;
        }
        let url = event.url.to_lowercase();
        !self.exclude.iter().any(|needle| url.contains(needle.as_str()))
    }
}

/// Captures the manifest URL of one episode at a time
pub struct ManifestCapture {
    clock: SharedClock,
    matcher: ManifestMatcher,
    timeout: Duration,
    poll_interval: Duration,
}

impl ManifestCapture {
    pub fn new(
        clock: SharedClock,
        matcher: ManifestMatcher,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            clock,
            matcher,
            timeout,
            poll_interval,
        }
    }

    pub fn from_settings(clock: SharedClock, settings: &CaptureSettings) -> Result<Self> {
        Ok(Self::new(
            clock,
            ManifestMatcher::from_settings(settings)?,
            settings.timeout(),
            settings.poll_interval(),
        ))
    }

    /// Open the episode behind `handle` and wait for its manifest request.
    ///
    /// Events recorded before the trigger are discarded, so a manifest left
    /// over from the previous episode is never returned.
    ///
    /// # Arguments
    /// * `session` - Browser session showing the season page
    /// * `handle` - Card of the episode to open
    /// * `code` - Episode code, used in logs and errors
    ///
    /// # Returns
    /// The first matching manifest URL observed after the trigger.
    ///
    /// # Errors
    /// * `HarvestError::CaptureTimeout` if nothing matched within the timeout
    /// * `HarvestError::Browser` if the session fails
    pub async fn capture<S>(&self, session: &mut S, handle: &UiHandle, code: &str) -> Result<ManifestUrl>
    where
        S: BrowserSession + ?Sized,
    {
        session.clear_network_log().await?;
        session.open_episode(handle).await?;
        self.wait_for_manifest(session, code).await
    }

    /// Poll the network log until a manifest request appears.
    pub async fn wait_for_manifest<S>(&self, session: &mut S, code: &str) -> Result<ManifestUrl>
    where
        S: BrowserSession + ?Sized,
    {
        let started = self.clock.now();
        let deadline = started + self.timeout;
        let mut polls = 0u32;

        loop {
            polls += 1;
            let events = session.drain_network_events().await?;
            if let Some(event) = events.into_iter().find(|event| self.matcher.matches(event)) {
                debug!("{}: manifest found after {} polls", code, polls);
                return Ok(ManifestUrl {
                    url: event.url,
                    captured_at: self.clock.now(),
                });
            }

            let now = self.clock.now();
            if now >= deadline {
                return Err(HarvestError::CaptureTimeout {
                    code: code.to_string(),
                    waited: now.saturating_duration_since(started),
                });
            }
            self.clock.sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}
