//! Downloader invocation and output naming
//!
//! Media is fetched by N_m3u8DL-RE. This module builds its command line and
//! knows which files a finished download leaves in the output directory.

use std::path::{Path, PathBuf};

use crate::sanitize::sanitize;
use crate::types::EpisodeRef;

/// Files belonging to one episode in the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// Sanitized `<series>.<code>.<title>` used as the downloader save name
    pub stem: String,
    /// Finalized media file, `<stem>.mp4`
    pub media: PathBuf,
    /// Subtitle track as saved by the downloader, `<stem>.<lang>.vtt`
    pub subtitle_vtt: PathBuf,
    /// Converted subtitle, `<stem>.<lang>.srt`
    pub subtitle_srt: PathBuf,
}

impl OutputPaths {
    pub fn new(out_dir: &Path, series: &str, episode: &EpisodeRef, lang: &str) -> Self {
        let stem = sanitize(&format!("{}.{}.{}", series, episode.code, episode.title));
        Self {
            media: out_dir.join(format!("{}.mp4", stem)),
            subtitle_vtt: out_dir.join(format!("{}.{}.vtt", stem, lang)),
            subtitle_srt: out_dir.join(format!("{}.{}.srt", stem, lang)),
            stem,
        }
    }

    /// File name of the media file, as recorded in the ledger
    pub fn media_file_name(&self) -> String {
        format!("{}.mp4", self.stem)
    }
}

/// One downloader run
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub manifest_url: String,
    pub save_dir: PathBuf,
    pub save_name: String,
    pub lang: String,
    pub thread_count: u32,
    headers: Vec<(String, String)>,
}

impl DownloadRequest {
    pub fn new(
        manifest_url: impl Into<String>,
        save_dir: impl Into<PathBuf>,
        save_name: impl Into<String>,
        lang: impl Into<String>,
        thread_count: u32,
    ) -> Self {
        Self {
            manifest_url: manifest_url.into(),
            save_dir: save_dir.into(),
            save_name: save_name.into(),
            lang: lang.into(),
            thread_count,
            headers: Vec::new(),
        }
    }

    /// Add a request header. Empty values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        let value = value.trim();
        if !value.is_empty() {
            self.headers.push((name.to_string(), value.to_string()));
        }
        self
    }

    /// Downloader arguments: best video, best audio and subtitles in the
    /// requested language, muxed to mp4 with subtitles left as a `.vtt`
    /// sidecar.
    ///
    /// # Example
    /// ```
    /// use vix_core::downloader::DownloadRequest;
    ///
    /// let args = DownloadRequest::new("https://cdn/x.mpd", "/out", "Serie.S01E001.Piloto", "es", 8)
    ///     .header("Referer", "https://vix.com/detail/ep-1")
    ///     .args();
    /// assert_eq!(args[0], "https://cdn/x.mpd");
    /// assert!(args.contains(&"best:lang=es".to_string()));
    /// assert_eq!(args[args.len() - 1], "Referer: https://vix.com/detail/ep-1");
    /// ```
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            self.manifest_url.clone(),
            "--save-dir".to_string(),
            self.save_dir.display().to_string(),
            "--save-name".to_string(),
            self.save_name.clone(),
            "--thread-count".to_string(),
            self.thread_count.to_string(),
            "-sv".to_string(),
            "best".to_string(),
            "-sa".to_string(),
            format!("best:lang={}", self.lang),
            "-ss".to_string(),
            format!("lang={}", self.lang),
            "--sub-format".to_string(),
            "VTT".to_string(),
            "-M".to_string(),
            "format=mp4:skip_sub=true".to_string(),
            "--del-after-done".to_string(),
        ];
        for (name, value) in &self.headers {
            args.push("--header".to_string());
            args.push(format!("{}: {}", name, value));
        }
        args
    }
}
