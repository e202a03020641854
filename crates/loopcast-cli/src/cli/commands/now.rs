//! `loopcast now` – what the channel is airing at this moment.

use anyhow::{bail, Result};
use chrono::Utc;
use loopcast_core::config::LoopcastConfig;
use loopcast_core::schedule::Schedule;

use super::schedule::{clock, describe};

pub fn run_now(cfg: &LoopcastConfig) -> Result<()> {
    let path = cfg.schedule_path()?;
    let Some(schedule) = Schedule::load(&path)? else {
        bail!("no schedule at {}; run `loopcast schedule` first", path.display());
    };
    let now_ms = Utc::now().timestamp_millis().max(0) as u64;
    let Some(airing) = schedule.entry_at(now_ms) else {
        bail!("schedule at {} is empty", path.display());
    };
    println!("{}", describe(airing.entry));
    println!(
        "  {} in, {} left",
        clock(airing.elapsed_ms),
        clock(airing.remaining_ms)
    );
    println!("  {}", airing.entry.file_path.display());
    Ok(())
}
