//! Chrome browser session
//!
//! Implements [`BrowserSession`] on top of chromiumoxide. The CDP handler
//! and a network listener run as background tasks; the listener records
//! every outgoing request so the harvester can look for manifest URLs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, EventRequestWillBeSent};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use vix_core::{BrowserSession, HarvestError, NetworkEvent, PageSelectors, Result, UiHandle};

/// Time given to dropdowns to render their options after a click
const DROPDOWN_DELAY: Duration = Duration::from_millis(1000);

/// Requests kept between drains; older ones are dropped first
const MAX_LOGGED_REQUESTS: usize = 2000;

type EventLog = Arc<Mutex<VecDeque<NetworkEvent>>>;

fn browser_error(context: &str, e: impl std::fmt::Display) -> HarvestError {
    HarvestError::Browser(format!("{}: {}", context, e))
}

fn lock(log: &EventLog) -> MutexGuard<'_, VecDeque<NetworkEvent>> {
    log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Append `event`, dropping the oldest entries beyond `capacity`
fn record(log: &EventLog, event: NetworkEvent, capacity: usize) {
    let mut events = lock(log);
    while events.len() >= capacity.max(1) {
        events.pop_front();
    }
    events.push_back(event);
}

/// A single Chrome tab driven over CDP
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    selectors: PageSelectors,
    events: EventLog,
    handler_task: JoinHandle<()>,
    listener_task: JoinHandle<()>,
}

impl ChromeSession {
    /// Launch Chrome and open a blank tab with network recording enabled.
    pub async fn launch(headless: bool, selectors: PageSelectors) -> Result<Self> {
        let builder = BrowserConfig::builder()
            .arg("--disable-gpu")
            .arg("--lang=es-ES,es")
            .arg("--autoplay-policy=no-user-gesture-required");
        let builder = if headless { builder } else { builder.with_head() };
        let config = builder
            .build()
            .map_err(|e| browser_error("Invalid browser configuration", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| browser_error("Failed to launch Chrome", e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {:?}", e);
                }
            }
            debug!("Browser handler task ended");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| browser_error("Failed to open a tab", e))?;

        page.execute(EnableParams::default())
            .await
            .map_err(|e| browser_error("Failed to enable network events", e))?;
        let mut requests = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| browser_error("Failed to listen for requests", e))?;

        let events: EventLog = Arc::new(Mutex::new(VecDeque::new()));
        let sink = events.clone();
        let listener_task = tokio::spawn(async move {
            while let Some(event) = requests.next().await {
                let request = NetworkEvent {
                    method: event.request.method.clone(),
                    url: event.request.url.clone(),
                    timestamp: Instant::now(),
                };
                record(&sink, request, MAX_LOGGED_REQUESTS);
            }
        });

        Ok(Self {
            browser,
            page,
            selectors,
            events,
            handler_task,
            listener_task,
        })
    }

    /// Close the browser and stop the background tasks.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close Chrome: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            debug!("Chrome did not exit cleanly: {}", e);
        }
        self.listener_task.abort();
        self.handler_task.abort();
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| browser_error("Script failed", e))?
            .into_value::<T>()
            .map_err(|e| browser_error("Unexpected script result", e))
    }

    /// Click the first element matching `selector`; `false` if there is none
    async fn click(&self, selector: &str) -> Result<bool> {
        self.eval(format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return false; el.click(); return true; }})()",
            json!(selector)
        ))
        .await
    }

    /// Click the first `selector` match whose text satisfies `test`, a JS
    /// function of the trimmed text
    async fn click_option(&self, selector: &str, test: &str) -> Result<bool> {
        self.eval(format!(
            "(() => {{ const test = {}; const el = Array.from(document.querySelectorAll({})).find(e => test((e.textContent || '').trim())); if (!el) return false; el.click(); return true; }})()",
            test,
            json!(selector)
        ))
        .await
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| browser_error(&format!("Failed to open {}", url), e))?;
        Ok(())
    }

    async fn page_title(&mut self) -> Result<String> {
        let title = self
            .page
            .get_title()
            .await
            .map_err(|e| browser_error("Failed to read the title", e))?;
        Ok(title.unwrap_or_default())
    }

    async fn current_url(&mut self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| browser_error("Failed to read the URL", e))?;
        Ok(url.unwrap_or_default())
    }

    async fn user_agent(&mut self) -> Result<String> {
        self.eval("navigator.userAgent".to_string()).await
    }

    async fn page_html(&mut self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| browser_error("Failed to read the page", e))
    }

    async fn scroll_by(&mut self, viewport_fraction: f64) -> Result<()> {
        let script = format!(
            "(() => {{ const f = {}; const list = document.querySelector({}); \
             if (list && list.scrollHeight > list.clientHeight) list.scrollBy(0, list.clientHeight * f); \
             window.scrollBy(0, window.innerHeight * f); return true; }})()",
            viewport_fraction,
            json!(self.selectors.card_container)
        );
        self.eval::<bool>(script).await.map(|_| ())
    }

    async fn select_season(&mut self, season: u32) -> Result<bool> {
        if !self.click(&self.selectors.season_button).await? {
            return Ok(false);
        }
        tokio::time::sleep(DROPDOWN_DELAY).await;

        let test = format!("t => new RegExp('\\\\b{}\\\\b').test(t)", season);
        if self.click_option(&self.selectors.season_option, &test).await? {
            Ok(true)
        } else {
            Err(HarvestError::Browser(format!("season {} is not offered", season)))
        }
    }

    async fn range_labels(&mut self) -> Result<Vec<String>> {
        if !self.click(&self.selectors.range_button).await? {
            return Ok(Vec::new());
        }
        tokio::time::sleep(DROPDOWN_DELAY).await;

        let labels: Vec<String> = self
            .eval(format!(
                "Array.from(document.querySelectorAll({})).map(e => (e.textContent || '').trim())",
                json!(self.selectors.range_option)
            ))
            .await?;

        // Close the dropdown again
        self.click(&self.selectors.range_button).await?;
        Ok(labels)
    }

    async fn select_range(&mut self, label: &str) -> Result<()> {
        if !self.click(&self.selectors.range_button).await? {
            return Err(HarvestError::Browser("episode range selector is gone".to_string()));
        }
        tokio::time::sleep(DROPDOWN_DELAY).await;

        let test = format!("t => t === {}", json!(label));
        if self.click_option(&self.selectors.range_option, &test).await? {
            Ok(())
        } else {
            Err(HarvestError::Browser(format!("range option '{}' not found", label)))
        }
    }

    async fn open_episode(&mut self, handle: &UiHandle) -> Result<()> {
        self.navigate(handle.href()).await
    }

    async fn clear_network_log(&mut self) -> Result<()> {
        lock(&self.events).clear();
        Ok(())
    }

    async fn drain_network_events(&mut self) -> Result<Vec<NetworkEvent>> {
        Ok(lock(&self.events).drain(..).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str) -> NetworkEvent {
        NetworkEvent {
            method: "GET".to_string(),
            url: url.to_string(),
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn test_record_drops_oldest_requests() {
        let log: EventLog = Arc::new(Mutex::new(VecDeque::new()));

        for n in 0..5 {
            record(&log, request(&format!("https://cdn.vix.com/segment-{}.m4s", n)), 3);
        }

        let urls: Vec<String> = lock(&log).iter().map(|e| e.url.clone()).collect();
        assert_eq!(
            urls,
            vec![
                "https://cdn.vix.com/segment-2.m4s",
                "https://cdn.vix.com/segment-3.m4s",
                "https://cdn.vix.com/segment-4.m4s",
            ]
        );
    }

    #[test]
    fn test_record_keeps_latest_with_zero_capacity() {
        let log: EventLog = Arc::new(Mutex::new(VecDeque::new()));

        record(&log, request("https://cdn.vix.com/a.mpd"), 0);
        record(&log, request("https://cdn.vix.com/b.mpd"), 0);

        assert_eq!(lock(&log).len(), 1);
        assert_eq!(lock(&log)[0].url, "https://cdn.vix.com/b.mpd");
    }
}
