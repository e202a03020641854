//! `loopcast schedule` – scan, block, shuffle and emit the timeline.

use anyhow::Result;
use chrono::Utc;
use loopcast_core::config::LoopcastConfig;
use loopcast_core::media::FfprobeProbe;
use loopcast_core::schedule::{self, TimelineEntry};
use std::path::Path;

const PREVIEW_ENTRIES: usize = 10;

pub async fn run_schedule(
    cfg: &LoopcastConfig,
    state_dir: &Path,
    dry_run: bool,
    seed: Option<u64>,
) -> Result<()> {
    let probe = FfprobeProbe::default();
    let generated = schedule::generate_from_library(cfg, state_dir, &probe, seed, Utc::now()).await?;
    let s = &generated.schedule;
    let report = &generated.report;

    println!(
        "{} entries in {} blocks, cycle {}",
        s.total_entries,
        report.total_blocks,
        clock(s.cycle_duration_ms)
    );
    if report.violations > 0 {
        println!(
            "warning: {} same-show adjacency violation(s){}",
            report.violations,
            if report.wrap_violation { " (including wrap)" } else { "" }
        );
    }
    for e in s.schedule.iter().take(PREVIEW_ENTRIES) {
        println!("  {}  {}", clock(e.start_offset_ms), describe(e));
    }
    if s.schedule.len() > PREVIEW_ENTRIES {
        println!("  ... {} more", s.schedule.len() - PREVIEW_ENTRIES);
    }

    if dry_run {
        println!("dry run: schedule not written");
        return Ok(());
    }
    let path = cfg.schedule_path()?;
    s.persist(&path)?;
    println!("wrote {}", path.display());
    Ok(())
}

/// `H:MM:SS`.
pub(crate) fn clock(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

pub(crate) fn describe(e: &TimelineEntry) -> String {
    let code = match e.episode_end {
        Some(end) if end > e.episode => format!("S{:02}E{:02}-E{:02}", e.season, e.episode, end),
        _ => format!("S{:02}E{:02}", e.season, e.episode),
    };
    format!("{} {} {} [{}]", e.show, code, e.title, clock(e.duration_ms))
}
