//! WebVTT to SubRip conversion
//!
//! The downloader saves subtitle tracks as WebVTT. Media players handle
//! SubRip better, so each track is rewritten as a `.srt` next to the media
//! file. Cue settings, styling blocks and voice/class spans are dropped;
//! `<i>`, `<b>` and `<u>` survive because SubRip players render them.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{HarvestError, Result};

/// Cue boundary in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Parse a WebVTT timestamp, `HH:MM:SS.mmm` or `MM:SS.mmm`.
    ///
    /// A comma is accepted in place of the dot.
    pub fn parse_vtt(text: &str) -> Option<Self> {
        let parts: Vec<&str> = text.trim().split(':').collect();
        let (hours, minutes, seconds) = match parts.as_slice() {
            [h, m, s] => (parse_digits(h)?, parse_digits(m)?, *s),
            [m, s] => (0, parse_digits(m)?, *s),
            _ => return None,
        };

        let (secs, millis) = seconds.split_once(['.', ','])?;
        let secs = parse_digits(secs)?;
        if millis.len() != 3 || minutes >= 60 || secs >= 60 {
            return None;
        }
        let millis = parse_digits(millis)?;

        let total_secs = hours.checked_mul(3600)?.checked_add(minutes * 60 + secs)?;
        Some(Self(total_secs.checked_mul(1000)?.checked_add(millis)?))
    }
}

/// SubRip form, `HH:MM:SS,mmm`
impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.0 % 1000;
        let total_secs = self.0 / 1000;
        write!(
            f,
            "{:02}:{:02}:{:02},{:03}",
            total_secs / 3600,
            (total_secs / 60) % 60,
            total_secs % 60,
            millis
        )
    }
}

fn parse_digits(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// One subtitle cue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub start: Timestamp,
    pub end: Timestamp,
    pub lines: Vec<String>,
}

/// Parse WebVTT text into cues.
///
/// Header, `NOTE`, `STYLE` and `REGION` blocks are skipped, as are cues with
/// an unreadable timing line, an end before their start, or no text left
/// after markup removal.
pub fn parse_vtt(input: &str) -> Vec<Cue> {
    let input = input.trim_start_matches('\u{feff}').replace("\r\n", "\n").replace('\r', "\n");

    let mut cues = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in input.lines().chain(std::iter::once("")) {
        if !line.trim().is_empty() {
            block.push(line);
            continue;
        }
        if !block.is_empty() {
            if let Some(cue) = parse_block(&block) {
                cues.push(cue);
            }
            block.clear();
        }
    }

    cues
}

fn parse_block(block: &[&str]) -> Option<Cue> {
    let first = block.first()?.trim_start();
    if ["WEBVTT", "NOTE", "STYLE", "REGION"]
        .iter()
        .any(|keyword| first.starts_with(keyword))
    {
        return None;
    }

    // Timing is the first line, or the second after a cue identifier
    let timing_index = block.iter().take(2).position(|line| line.contains("-->"))?;
    let (start, rest) = block[timing_index].split_once("-->")?;
    let start = Timestamp::parse_vtt(start)?;
    let end = Timestamp::parse_vtt(rest.split_whitespace().next()?)?;
    if end < start {
        debug!("Skipping cue ending before it starts: {}", block[timing_index]);
        return None;
    }

    let lines: Vec<String> = block[timing_index + 1..]
        .iter()
        .map(|line| clean_text(line))
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return None;
    }

    Some(Cue { start, end, lines })
}

/// Remove WebVTT markup from a cue line, keeping basic emphasis tags
fn clean_text(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let tag_start = &rest[open..];
        match tag_start.find('>') {
            Some(close) => {
                if let Some(kept) = kept_tag(&tag_start[1..close]) {
                    out.push_str(&kept);
                }
                rest = &tag_start[close + 1..];
            }
            None => {
                out.push_str(tag_start);
                rest = "";
            }
        }
    }
    out.push_str(rest);

    decode_entities(out.trim())
}

fn kept_tag(tag: &str) -> Option<String> {
    let (closing, body) = match tag.strip_prefix('/') {
        Some(body) => (true, body),
        None => (false, tag),
    };
    let name: String = body
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();

    match name.as_str() {
        "i" | "b" | "u" if closing => Some(format!("</{}>", name)),
        "i" | "b" | "u" => Some(format!("<{}>", name)),
        _ => None,
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lrm;", "")
        .replace("&rlm;", "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Render cues as SubRip, numbering them from 1.
pub fn to_srt(cues: &[Cue]) -> String {
    let mut out = String::new();
    for (index, cue) in cues.iter().enumerate() {
        out.push_str(&format!("{}\n{} --> {}\n", index + 1, cue.start, cue.end));
        for line in &cue.lines {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

/// Convert WebVTT text to SubRip text.
///
/// # Returns
/// * `Some(srt)` if at least one cue survived
/// * `None` if the input holds no usable cue
///
/// # Example
/// ```
/// use vix_core::subtitles::vtt_to_srt;
///
/// let vtt = "WEBVTT\n\n00:01.000 --> 00:02.500 line:90%\n<c.yellow>Hola</c>\n";
/// assert_eq!(
///     vtt_to_srt(vtt).unwrap(),
///     "1\n00:00:01,000 --> 00:00:02,500\nHola\n\n"
/// );
/// ```
pub fn vtt_to_srt(input: &str) -> Option<String> {
    let cues = parse_vtt(input);
    if cues.is_empty() {
        return None;
    }
    Some(to_srt(&cues))
}

/// Convert a `.vtt` file to a `.srt` file next to it.
///
/// The source file is removed once the SubRip file is written. If removal
/// fails the source stays behind and a warning is logged.
///
/// # Returns
/// Path of the written `.srt` file
///
/// # Errors
/// Returns `HarvestError::Conversion` if the file cannot be read, holds no
/// usable cue, or the output cannot be written. The source is left intact
/// in that case.
pub fn convert(vtt_path: &Path) -> Result<PathBuf> {
    let conversion_error = |detail: String| HarvestError::Conversion {
        path: vtt_path.to_path_buf(),
        detail,
    };

    let bytes = std::fs::read(vtt_path).map_err(|e| conversion_error(e.to_string()))?;
    let text = String::from_utf8_lossy(&bytes);
    let srt = vtt_to_srt(&text).ok_or_else(|| conversion_error("no cues found".to_string()))?;

    let srt_path = vtt_path.with_extension("srt");
    std::fs::write(&srt_path, srt).map_err(|e| conversion_error(e.to_string()))?;

    if let Err(e) = std::fs::remove_file(vtt_path) {
        warn!("Could not remove {}: {}", vtt_path.display(), e);
    }

    Ok(srt_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_parse_forms() {
        assert_eq!(Timestamp::parse_vtt("01:02:03.456"), Some(Timestamp::from_millis(3_723_456)));
        assert_eq!(Timestamp::parse_vtt("02:03.456"), Some(Timestamp::from_millis(123_456)));
        assert_eq!(Timestamp::parse_vtt("00:00:01,000"), Some(Timestamp::from_millis(1000)));
    }

    #[test]
    fn test_timestamp_parse_invalid() {
        assert_eq!(Timestamp::parse_vtt("1.000"), None);
        assert_eq!(Timestamp::parse_vtt("00:61.000"), None);
        assert_eq!(Timestamp::parse_vtt("00:01.5"), None);
        assert_eq!(Timestamp::parse_vtt("aa:01.000"), None);
        assert_eq!(Timestamp::parse_vtt(""), None);
    }

    #[test]
    fn test_timestamp_parse_rejects_overflowing_hours() {
        assert_eq!(Timestamp::parse_vtt("99999999999999999:00:00.000"), None);
        assert_eq!(
            Timestamp::parse_vtt("1000:00:00.000"),
            Some(Timestamp::from_millis(3_600_000_000))
        );
    }

    #[test]
    fn test_vtt_skips_cue_with_huge_hours() {
        let cues = parse_vtt(
            "WEBVTT\n\n99999999999999999:00:00.000 --> 99999999999999999:00:01.000\nbad\n\n00:00:01.000 --> 00:00:02.500\nok\n",
        );
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].lines, vec!["ok".to_string()]);
        assert_eq!(cues[0].start, Timestamp::from_millis(1000));
    }

    #[test]
    fn test_timestamp_display_srt() {
        assert_eq!(Timestamp::from_millis(3_723_456).to_string(), "01:02:03,456");
        assert_eq!(Timestamp::from_millis(0).to_string(), "00:00:00,000");
        assert_eq!(Timestamp::from_millis(100 * 3_600_000).to_string(), "100:00:00,000");
    }

    #[test]
    fn test_vtt_to_srt_full_document() {
        let vtt = "\u{feff}WEBVTT\r\nKind: captions\r\nLanguage: es\r\n\r\n\
                   NOTE generated by packager\r\n\r\n\
                   STYLE\r\n::cue { color: yellow }\r\n\r\n\
                   intro\r\n00:00:01.000 --> 00:00:03.000 align:start position:10%\r\n\
                   <v Ana>¿Dónde estás?</v>\r\n\r\n\
                   00:04.250 --> 00:06.000\r\n<i>Aquí</i> &amp; <c.red>allá</c>\r\nsegunda línea\r\n";

        let srt = vtt_to_srt(vtt).unwrap();

        assert_eq!(
            srt,
            "1\n00:00:01,000 --> 00:00:03,000\n¿Dónde estás?\n\n\
             2\n00:00:04,250 --> 00:00:06,000\n<i>Aquí</i> & allá\nsegunda línea\n\n"
        );
    }

    #[test]
    fn test_vtt_skips_malformed_cues() {
        let vtt = "WEBVTT\n\n\
                   00:00:05.000 --> 00:00:04.000\nbackwards\n\n\
                   garbage --> 00:00:04.000\nbroken\n\n\
                   00:00:07.000 --> 00:00:08.000\n<c.x></c>\n\n\
                   00:00:09.000 --> 00:00:10.000\nok\n";

        let cues = parse_vtt(vtt);

        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].lines, vec!["ok".to_string()]);
    }

    #[test]
    fn test_vtt_inline_timestamps_removed() {
        let vtt = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nuno <00:00:01.500>dos\n";
        let cues = parse_vtt(vtt);
        assert_eq!(cues[0].lines, vec!["uno dos".to_string()]);
    }

    #[test]
    fn test_vtt_without_cues() {
        assert_eq!(vtt_to_srt("WEBVTT\n\nNOTE nothing here\n"), None);
        assert_eq!(vtt_to_srt(""), None);
    }

    #[test]
    fn test_convert_writes_srt_and_removes_vtt() {
        let dir = tempfile::tempdir().unwrap();
        let vtt_path = dir.path().join("Serie.S01E001.Piloto.es.vtt");
        std::fs::write(&vtt_path, "WEBVTT\n\n00:01.000 --> 00:02.000\nHola\n").unwrap();

        let srt_path = convert(&vtt_path).unwrap();

        assert_eq!(srt_path, dir.path().join("Serie.S01E001.Piloto.es.srt"));
        assert!(!vtt_path.exists());
        let srt = std::fs::read_to_string(&srt_path).unwrap();
        assert_eq!(srt, "1\n00:00:01,000 --> 00:00:02,000\nHola\n\n");
    }

    #[test]
    fn test_convert_keeps_vtt_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let vtt_path = dir.path().join("empty.es.vtt");
        std::fs::write(&vtt_path, "WEBVTT\n").unwrap();

        match convert(&vtt_path) {
            Err(HarvestError::Conversion { path, detail }) => {
                assert_eq!(path, vtt_path);
                assert_eq!(detail, "no cues found");
            }
            other => panic!("Expected Conversion error, got {:?}", other),
        }
        assert!(vtt_path.exists());
        assert!(!dir.path().join("empty.es.srt").exists());
    }

    #[test]
    fn test_convert_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = convert(&dir.path().join("missing.vtt"));
        assert!(matches!(result, Err(HarvestError::Conversion { .. })));
    }
}
