//! Season and watch page metadata

use deunicode::deunicode;
use scraper::{Html, Selector};

use crate::error::Result;
use crate::parser::cards::compile;
use crate::sanitize::sanitize;

/// Series name used when the page title yields nothing usable
pub const UNKNOWN_SERIES: &str = "Unknown_Series";

/// Extract the series name from a season page title.
///
/// ViX titles look like "Ver El Señor de los Cielos por ViX". The leading
/// "Ver" and the trailing site suffix are removed and the rest sanitized.
///
/// # Returns
/// * `Some(name)` with the sanitized series name
/// * `None` if nothing remains after cleanup
pub fn parse_series_title(page_title: &str) -> Option<String> {
    let prefix = regex_lite::Regex::new(r"(?i)^\s*ver\s+").ok()?;
    let suffix = regex_lite::Regex::new(r"(?i)\s*(?:por\s+ViX|\|\s*ViX)\b.*$").ok()?;

    let without_prefix = prefix.replace(page_title, "");
    let name = sanitize(&suffix.replace(&without_prefix, ""));

    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Series name for file naming, falling back to [`UNKNOWN_SERIES`].
pub fn series_name(page_title: &str) -> String {
    parse_series_title(page_title).unwrap_or_else(|| UNKNOWN_SERIES.to_string())
}

/// Reads the episode title shown on a watch page
#[derive(Debug)]
pub struct EpisodeHeading {
    selector: Selector,
}

impl EpisodeHeading {
    /// # Errors
    /// Returns `HarvestError::InvalidConfig` if `css` is not a valid selector.
    pub fn new(css: &str) -> Result<Self> {
        Ok(Self {
            selector: compile(css)?,
        })
    }

    /// Text of the first matching element that is not blank, with
    /// whitespace collapsed.
    pub fn parse(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let heading = document
            .select(&self.selector)
            .map(|element| element.text().collect::<Vec<_>>().join(" "))
            .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
            .find(|text| !text.is_empty());
        heading
    }
}

/// Whether a watch page heading should replace the title read from the card.
///
/// Comparison ignores case and accents. A heading already contained in the
/// card title keeps the card title.
pub fn heading_replaces_title(heading: &str, card_title: &str) -> bool {
    let fold = |text: &str| deunicode(text).to_lowercase();
    let heading = fold(heading.trim());
    !heading.is_empty() && !fold(card_title).contains(&heading)
}
