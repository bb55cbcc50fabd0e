//! vix-harvest: download a ViX season with Chrome and N_m3u8DL-RE
//!
//! Exit status is 0 when every episode finished, 1 when some episodes
//! failed and 2 when the run was aborted.

mod browser;
mod cli;
mod logging;
mod settings;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use vix_core::{Harvester, RunSummary, StopSignal};

use crate::browser::ChromeSession;
use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.debug);

    match run(&cli).await {
        Ok(summary) if summary.has_failures() => {
            warn!("{} episodes failed, see failures.log", summary.failed);
            ExitCode::from(1)
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: &Cli) -> Result<RunSummary> {
    let settings = settings::load_settings(cli.config.as_deref())?;
    let harvester = Harvester::new(settings)?;
    let config = cli.run_config();

    watch_interrupts(harvester.stop_signal());

    let mut session = ChromeSession::launch(cli.headless, harvester.settings().selectors.clone())
        .await
        .context("Could not start the browser")?;
    let result = harvester.run(&mut session, &config).await;
    session.close().await;

    let summary = result.context("Harvest aborted")?;
    info!("Summary: {}", summary);
    Ok(summary)
}

/// First Ctrl-C stops after the current episode, a second one exits at once
fn watch_interrupts(stop: StopSignal) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received, stopping after the current episode (press Ctrl-C again to quit now)");
        stop.raise();

        if tokio::signal::ctrl_c().await.is_ok() {
            error!("Second interrupt, exiting");
            std::process::exit(130);
        }
    });
}
