//! HTML and text parsers for ViX pages
//!
//! This module contains the pure parsing helpers used by discovery:
//! - `cards`: Parse the episode cards of a season page
//! - `page`: Derive the series name and episode headings from page markup

pub mod cards;
pub mod page;

// Re-export main parsing functions
pub use cards::{episode_code, parse_episode_code, parse_episode_number, CardParser};
pub use page::{heading_replaces_title, parse_series_title, series_name, EpisodeHeading, UNKNOWN_SERIES};
