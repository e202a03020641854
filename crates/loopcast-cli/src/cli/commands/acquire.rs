//! `loopcast acquire` – fill the library, tier by tier.

use anyhow::{Context, Result};
use loopcast_core::acquire::{AcquireOptions, Acquirer, RunMode};
use loopcast_core::config::LoopcastConfig;
use loopcast_core::media::FfmpegRemuxer;
use loopcast_core::providers::Providers;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use super::status::print_reports;

pub async fn run_acquire(
    cfg: LoopcastConfig,
    state_dir: PathBuf,
    resume: bool,
    show: Option<String>,
    refresh_catalog: bool,
) -> Result<()> {
    let providers = Providers::from_config(&cfg.providers).context("provider setup")?;
    let opts = AcquireOptions {
        mode: if resume { RunMode::Resume } else { RunMode::Full },
        show,
        refresh_catalog,
    };
    tracing::info!(mode = ?opts.mode, show = ?opts.show, "acquisition starting");

    let started = Instant::now();
    let acquirer = Acquirer::new(cfg, state_dir, providers, Arc::new(FfmpegRemuxer::default()));
    let reports = acquirer.run(&opts).await?;
    print_reports(&reports);

    let complete = reports.iter().filter(|r| r.is_complete()).count();
    println!(
        "\n{} of {} show(s) complete in {:.1}s",
        complete,
        reports.len(),
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
