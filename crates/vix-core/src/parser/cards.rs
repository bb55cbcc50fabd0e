//! Episode card parser for ViX season pages
//!
//! The season page renders its episode list lazily. Each pass reads the
//! cards rendered so far; discovery merges the passes.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::PageSelectors;
use crate::error::{HarvestError, Result};
use crate::sanitize::sanitize;
use crate::types::{EpisodeRef, UiHandle};

/// Title used when a card carries nothing but its episode number
const FALLBACK_TITLE: &str = "Episode";

/// Reads episode cards out of a season page snapshot
#[derive(Debug)]
pub struct CardParser {
    container: Selector,
    link: Selector,
}

impl CardParser {
    /// Compile the card selectors.
    ///
    /// # Errors
    /// Returns `HarvestError::InvalidConfig` if a selector is not valid CSS.
    pub fn new(selectors: &PageSelectors) -> Result<Self> {
        Ok(Self {
            container: compile(&selectors.card_container)?,
            link: compile(&selectors.card_link)?,
        })
    }

    /// Parse the cards currently present in `html`.
    ///
    /// # Arguments
    /// * `html` - Serialized page HTML
    /// * `page_url` - URL of the page, used to resolve relative card links
    /// * `season` - Season number used in the episode codes
    ///
    /// # Returns
    /// Episodes in page order. Cards without a link, or with neither an
    /// episode number nor a usable title, are left out.
    pub fn parse(&self, html: &str, page_url: &str, season: u32) -> Vec<EpisodeRef> {
        let document = Html::parse_document(html);
        let base = Url::parse(page_url).ok();

        let mut links: Vec<ElementRef> = document
            .select(&self.container)
            .flat_map(|container| container.select(&self.link))
            .collect();

        // Some layouts render the cards outside the list container
        if links.is_empty() {
            links = document.select(&self.link).collect();
        }

        links
            .into_iter()
            .filter_map(|link| parse_card(link, base.as_ref(), season))
            .collect()
    }
}

pub(crate) fn compile(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| HarvestError::InvalidConfig(format!("invalid selector '{}': {:?}", css, e)))
}

fn parse_card(link: ElementRef<'_>, base: Option<&Url>, season: u32) -> Option<EpisodeRef> {
    let href = link.value().attr("href")?.trim();
    if href.is_empty() {
        return None;
    }
    let absolute = resolve_href(href, base)?;

    let card = card_root(link);
    let text = card
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");

    let title = card_title(&text);
    let code = match parse_episode_number(&text) {
        Some(number) => episode_code(season, number),
        None => unknown_code(&title)?,
    };

    Some(EpisodeRef {
        code,
        title: if title.is_empty() {
            FALLBACK_TITLE.to_string()
        } else {
            title
        },
        ui_handle: UiHandle::new(absolute),
    })
}

/// Nearest enclosing `div[role=button]`, which holds the whole card text
fn card_root(link: ElementRef<'_>) -> ElementRef<'_> {
    link.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "div" && el.value().attr("role") == Some("button"))
        .unwrap_or(link)
}

fn resolve_href(href: &str, base: Option<&Url>) -> Option<String> {
    match Url::parse(href) {
        Ok(url) => Some(url.into()),
        Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(href).ok().map(String::from),
        Err(_) => None,
    }
}

/// Card text with the episode marker removed
fn card_title(text: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"(?i)\bEP\.?\s*\d+") else {
        return text.trim().to_string();
    };
    re.replace(text, "")
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '|' | ':' | '·'))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Code for a card without an episode number, derived from its title
fn unknown_code(title: &str) -> Option<String> {
    let head: String = title.chars().take(30).collect();
    let slug = sanitize(&head).replace(' ', "_");
    if slug.is_empty() {
        return None;
    }
    Some(format!("UNK_{}", slug))
}

/// Extract the episode number from card text like "EP. 12 El regreso".
///
/// # Examples
/// ```
/// use vix_core::parser::parse_episode_number;
///
/// assert_eq!(parse_episode_number("EP. 12 El regreso"), Some(12));
/// assert_eq!(parse_episode_number("ep 3"), Some(3));
/// assert_eq!(parse_episode_number("El regreso"), None);
/// ```
pub fn parse_episode_number(text: &str) -> Option<u32> {
    let re = regex_lite::Regex::new(r"(?i)\bEP\.?\s*(\d+)").ok()?;
    let caps = re.captures(text)?;
    caps.get(1)?.as_str().parse().ok()
}

/// Format the episode code for `season` and `episode`.
///
/// # Examples
/// ```
/// use vix_core::parser::episode_code;
///
/// assert_eq!(episode_code(1, 4), "S01E004");
/// assert_eq!(episode_code(12, 1234), "S12E1234");
/// ```
pub fn episode_code(season: u32, episode: u32) -> String {
    format!("S{:02}E{:03}", season, episode)
}

/// Find an episode code (e.g., "S01E004") inside arbitrary text such as a
/// file name.
///
/// # Examples
/// ```
/// use vix_core::parser::parse_episode_code;
///
/// assert_eq!(parse_episode_code("Show.S01E004.Piloto"), Some((1, 4)));
/// assert_eq!(parse_episode_code("s2e15"), Some((2, 15)));
/// assert_eq!(parse_episode_code("no code here"), None);
/// ```
pub fn parse_episode_code(text: &str) -> Option<(u32, u32)> {
    let re = regex_lite::Regex::new(r"(?i)S(\d{1,3})E(\d{1,4})").ok()?;
    let caps = re.captures(text)?;
    let season: u32 = caps.get(1)?.as_str().parse().ok()?;
    let episode: u32 = caps.get(2)?.as_str().parse().ok()?;
    Some((season, episode))
}
