//! CLI for the loopcast channel engine.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use loopcast_core::config::{self, LoopcastConfig};
use std::path::PathBuf;

use commands::{run_acquire, run_combine, run_now, run_schedule, run_status};

/// Top-level CLI for loopcast.
#[derive(Debug, Parser)]
#[command(name = "loopcast")]
#[command(about = "loopcast: acquire a TV library and air it as a pseudo-live channel", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/loopcast/config.toml).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Acquire every missing episode of the configured shows.
    Acquire {
        /// Keep episodes already marked not found; retry only errors and missing files.
        #[arg(long)]
        resume: bool,
        /// Only this show (id or name).
        #[arg(long, value_name = "NAME")]
        show: Option<String>,
        /// Fetch episode metadata again even if the cached catalog is fresh.
        #[arg(long)]
        refresh_catalog: bool,
    },

    /// Show acquisition progress per show without doing any work.
    Status {
        /// Only this show (id or name).
        #[arg(long, value_name = "NAME")]
        show: Option<String>,
    },

    /// Scan the library and generate the channel schedule.
    Schedule {
        /// Print the result without writing the schedule file.
        #[arg(long)]
        dry_run: bool,
        /// Shuffle seed (default: schedule.seed from the config).
        #[arg(long, value_name = "N")]
        seed: Option<u64>,
    },

    /// Combine downloaded multi-part episodes into single files.
    Combine {
        /// Only this show (id or name).
        #[arg(long, value_name = "NAME")]
        show: Option<String>,
    },

    /// Print what is airing right now.
    Now,
}

fn load_config(path: Option<&PathBuf>) -> Result<LoopcastConfig> {
    match path {
        Some(p) => config::load_from_path(p),
        None => config::load_or_init(),
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = load_config(cli.config.as_ref())?;
        tracing::debug!("loaded config: {:?}", cfg);
        let state_dir = cfg.state_dir()?;

        match cli.command {
            CliCommand::Acquire {
                resume,
                show,
                refresh_catalog,
            } => run_acquire(cfg, state_dir, resume, show, refresh_catalog).await?,
            CliCommand::Status { show } => run_status(&cfg, &state_dir, show.as_deref())?,
            CliCommand::Schedule { dry_run, seed } => {
                run_schedule(&cfg, &state_dir, dry_run, seed).await?
            }
            CliCommand::Combine { show } => run_combine(&cfg, &state_dir, show.as_deref()).await?,
            CliCommand::Now => run_now(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
