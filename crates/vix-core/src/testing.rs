//! Test doubles for the browser, process and clock seams

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::browser::BrowserSession;
use crate::clock::Clock;
use crate::error::{HarvestError, Result};
use crate::process::{ProcessExit, ProcessRunner};
use crate::types::{NetworkEvent, UiHandle};

pub(crate) const SEASON_URL: &str = "https://vix.com/es-es/detail/serie-prueba";

pub(crate) fn network_event(method: &str, url: &str) -> NetworkEvent {
    NetworkEvent {
        method: method.to_string(),
        url: url.to_string(),
        timestamp: Instant::now(),
    }
}

pub(crate) fn episode_href(number: u32) -> String {
    format!("https://vix.com/es-es/detail/ep-{}", number)
}

/// Season page snapshot with one card per episode number
pub(crate) fn episodes_page(numbers: impl IntoIterator<Item = u32>) -> String {
    let cards: String = numbers
        .into_iter()
        .map(|n| {
            format!(
                r#"<div role="button"><a class="Card_link__x" href="/es-es/detail/ep-{n}"></a><p>EP. {n}</p><p>Capitulo {n}</p></div>"#
            )
        })
        .collect();
    format!(r#"<html><body><div class="ContentList_container__y">{}</div></body></html>"#, cards)
}

/// Clock that advances only when slept on
pub(crate) struct FakeClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
    pub(crate) fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap()
    }

    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        *self.elapsed.lock().unwrap() += duration;
        self.sleeps.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}

/// Scripted browser session
///
/// Pages are keyed by range label; the empty label holds the page shown
/// before any range is selected. Each scroll reveals the next snapshot of
/// the current range, the last snapshot repeats.
pub(crate) struct FakeBrowser {
    title: String,
    url: String,
    user_agent: String,
    has_season_selector: bool,
    pages: HashMap<String, Vec<String>>,
    watch_pages: HashMap<String, String>,
    range_labels: Vec<String>,
    current_range: String,
    position: usize,
    html_reads_left: Option<usize>,
    log: Vec<NetworkEvent>,
    responses: HashMap<String, (u32, Vec<NetworkEvent>)>,
    scheduled: Option<(u32, Vec<NetworkEvent>)>,
    navigations: Vec<String>,
    opened: Vec<String>,
    selected_ranges: Vec<String>,
    selected_season: Option<u32>,
    scrolls: usize,
}

impl FakeBrowser {
    pub(crate) fn new() -> Self {
        Self {
            title: "Ver Serie Prueba por ViX".to_string(),
            url: SEASON_URL.to_string(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) FakeBrowser".to_string(),
            has_season_selector: false,
            pages: HashMap::new(),
            watch_pages: HashMap::new(),
            range_labels: Vec::new(),
            current_range: String::new(),
            position: 0,
            html_reads_left: None,
            log: Vec::new(),
            responses: HashMap::new(),
            scheduled: None,
            navigations: Vec::new(),
            opened: Vec::new(),
            selected_ranges: Vec::new(),
            selected_season: None,
            scrolls: 0,
        }
    }

    pub(crate) fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub(crate) fn with_season_selector(mut self) -> Self {
        self.has_season_selector = true;
        self
    }

    pub(crate) fn with_pages(mut self, snapshots: Vec<String>) -> Self {
        self.pages.insert(String::new(), snapshots);
        self
    }

    pub(crate) fn with_range(mut self, label: &str, snapshots: Vec<String>) -> Self {
        self.range_labels.push(label.to_string());
        self.pages.insert(label.to_string(), snapshots);
        self
    }

    /// Watch page of episode `number`, showing `heading` as its title
    pub(crate) fn with_watch_heading(mut self, number: u32, heading: &str) -> Self {
        let html = format!(
            "<html><body><main><h1>{}</h1><p>Serie Prueba</p></main></body></html>",
            heading
        );
        self.watch_pages.insert(episode_href(number), html);
        self
    }

    /// A range listed in the selector that fails to open
    pub(crate) fn with_broken_range(mut self, label: &str) -> Self {
        self.range_labels.push(label.to_string());
        self
    }

    /// Fail every `page_html` call after the first `reads`
    pub(crate) fn failing_html_after(mut self, reads: usize) -> Self {
        self.html_reads_left = Some(reads);
        self
    }

    /// Manifest requests the player makes when `href` is opened
    pub(crate) fn on_open(&mut self, href: &str, events: Vec<NetworkEvent>) {
        self.on_open_after(href, 0, events);
    }

    /// Like [`on_open`](Self::on_open), delivered after `empty_polls` empty drains
    pub(crate) fn on_open_after(&mut self, href: &str, empty_polls: u32, events: Vec<NetworkEvent>) {
        self.responses.insert(href.to_string(), (empty_polls, events));
    }

    /// Episode `number` serves `<ep-number>/manifest.mpd` when opened
    pub(crate) fn serving_manifests(mut self, numbers: impl IntoIterator<Item = u32>) -> Self {
        for number in numbers {
            let manifest = format!("https://cdn.vix.com/ep-{}/manifest.mpd", number);
            self.on_open(&episode_href(number), vec![network_event("GET", &manifest)]);
        }
        self
    }

    pub(crate) fn push_event(&mut self, event: NetworkEvent) {
        self.log.push(event);
    }

    pub(crate) fn opened(&self) -> &[String] {
        &self.opened
    }

    pub(crate) fn navigations(&self) -> &[String] {
        &self.navigations
    }

    pub(crate) fn selected_ranges(&self) -> &[String] {
        &self.selected_ranges
    }

    pub(crate) fn selected_season(&self) -> Option<u32> {
        self.selected_season
    }

    pub(crate) fn scrolls(&self) -> usize {
        self.scrolls
    }
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.navigations.push(url.to_string());
        self.url = url.to_string();
        Ok(())
    }

    async fn page_title(&mut self) -> Result<String> {
        Ok(self.title.clone())
    }

    async fn current_url(&mut self) -> Result<String> {
        Ok(self.url.clone())
    }

    async fn user_agent(&mut self) -> Result<String> {
        Ok(self.user_agent.clone())
    }

    async fn page_html(&mut self) -> Result<String> {
        if let Some(left) = self.html_reads_left.as_mut() {
            if *left == 0 {
                return Err(HarvestError::Browser("target closed".to_string()));
            }
            *left -= 1;
        }
        if let Some(html) = self.watch_pages.get(&self.url) {
            return Ok(html.clone());
        }
        let html = self
            .pages
            .get(&self.current_range)
            .and_then(|snapshots| snapshots.get(self.position.min(snapshots.len().saturating_sub(1))))
            .cloned()
            .unwrap_or_else(|| "<html><body></body></html>".to_string());
        Ok(html)
    }

    async fn scroll_by(&mut self, _viewport_fraction: f64) -> Result<()> {
        self.scrolls += 1;
        self.position += 1;
        Ok(())
    }

    async fn select_season(&mut self, season: u32) -> Result<bool> {
        if !self.has_season_selector {
            return Ok(false);
        }
        self.selected_season = Some(season);
        Ok(true)
    }

    async fn range_labels(&mut self) -> Result<Vec<String>> {
        Ok(self.range_labels.clone())
    }

    async fn select_range(&mut self, label: &str) -> Result<()> {
        if !self.pages.contains_key(label) {
            return Err(HarvestError::Browser(format!("range option '{}' not found", label)));
        }
        self.selected_ranges.push(label.to_string());
        self.current_range = label.to_string();
        self.position = 0;
        Ok(())
    }

    async fn open_episode(&mut self, handle: &UiHandle) -> Result<()> {
        self.opened.push(handle.href().to_string());
        self.url = handle.href().to_string();
        self.scheduled = self.responses.get(handle.href()).cloned();
        Ok(())
    }

    async fn clear_network_log(&mut self) -> Result<()> {
        self.log.clear();
        Ok(())
    }

    async fn drain_network_events(&mut self) -> Result<Vec<NetworkEvent>> {
        match self.scheduled.take() {
            Some((0, events)) => self.log.extend(events),
            Some((polls, events)) => self.scheduled = Some((polls - 1, events)),
            None => {}
        }
        Ok(std::mem::take(&mut self.log))
    }
}

/// What the fake downloader leaves next to the media file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubtitleOutput {
    None,
    Valid,
    Broken,
}

/// Downloader stand-in that writes the files a real run would produce
pub(crate) struct FakeRunner {
    lang: String,
    subtitles: SubtitleOutput,
    failing: HashSet<String>,
    silent: HashSet<String>,
    missing: bool,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeRunner {
    pub(crate) fn new() -> Self {
        Self {
            lang: "es".to_string(),
            subtitles: SubtitleOutput::Valid,
            failing: HashSet::new(),
            silent: HashSet::new(),
            missing: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_subtitles(mut self, subtitles: SubtitleOutput) -> Self {
        self.subtitles = subtitles;
        self
    }

    /// Exit with code 1 for save names containing `code`
    pub(crate) fn failing_for(mut self, code: &str) -> Self {
        self.failing.insert(code.to_string());
        self
    }

    /// Exit successfully for `code` without writing any file
    pub(crate) fn silent_for(mut self, code: &str) -> Self {
        self.silent.insert(code.to_string());
        self
    }

    pub(crate) fn missing(mut self) -> Self {
        self.missing = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Save names of every invocation, in order
    pub(crate) fn save_names(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|(_, args)| arg_after(args, "--save-name"))
            .collect()
    }
}

fn arg_after(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|index| args.get(index + 1))
        .cloned()
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<ProcessExit> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));

        if self.missing {
            return Err(HarvestError::ToolMissing(program.to_string()));
        }

        let dir = PathBuf::from(arg_after(args, "--save-dir").unwrap_or_default());
        let name = arg_after(args, "--save-name").unwrap_or_default();

        if self.failing.iter().any(|code| name.contains(code.as_str())) {
            return Ok(ProcessExit::from_code(1));
        }
        if self.silent.iter().any(|code| name.contains(code.as_str())) {
            return Ok(ProcessExit::from_code(0));
        }

        std::fs::write(dir.join(format!("{}.mp4", name)), b"media").unwrap();
        let vtt = dir.join(format!("{}.{}.vtt", name, self.lang));
        match self.subtitles {
            SubtitleOutput::None => {}
            SubtitleOutput::Valid => std::fs::write(
                vtt,
                "WEBVTT\n\n00:00:01.000 --> 00:00:02.500\nHola\n",
            )
            .unwrap(),
            SubtitleOutput::Broken => std::fs::write(vtt, "WEBVTT\n\nnot a cue\n").unwrap(),
        }

        Ok(ProcessExit::from_code(0))
    }
}
