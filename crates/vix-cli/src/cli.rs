use std::path::PathBuf;

use clap::Parser;
use vix_core::RunConfig;

#[derive(Parser, Debug)]
#[command(name = "vix-harvest")]
#[command(about = "Download every episode of a ViX season, resuming where the last run stopped")]
#[command(version)]
pub struct Cli {
    /// Season page URL (e.g. https://vix.com/es-es/detail/series-1234)
    pub url: String,

    /// Season number to download
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub season: u32,

    /// Audio and subtitle language code
    #[arg(short, long, default_value = "es")]
    pub lang: String,

    /// Output directory for media, subtitles and the ledger
    #[arg(short, long, default_value = ".")]
    pub out: PathBuf,

    /// Run Chrome without a window
    #[arg(long)]
    pub headless: bool,

    /// Verbose logging
    #[arg(long)]
    pub debug: bool,

    /// TOML file overriding harvester settings
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            base_url: self.url.clone(),
            season: self.season,
            lang: self.lang.clone(),
            out_dir: self.out.clone(),
            headless: self.headless,
            debug: self.debug,
        }
    }
}
