//! `loopcast status` – per-show progress from the state files.

use anyhow::Result;
use loopcast_core::acquire::{status_reports, ShowReport};
use loopcast_core::config::LoopcastConfig;
use loopcast_core::state::EpisodeStatus;
use std::path::Path;

pub fn run_status(cfg: &LoopcastConfig, state_dir: &Path, show: Option<&str>) -> Result<()> {
    let shows = cfg.select_shows(show)?;
    if shows.is_empty() {
        println!("No shows configured.");
        return Ok(());
    }
    let reports = status_reports(state_dir, &shows)?;
    print_reports(&reports);
    Ok(())
}

fn label(report: &ShowReport) -> &str {
    if report.title.is_empty() {
        &report.show_id
    } else {
        &report.title
    }
}

/// Summary table plus one line per not-found or failed episode.
pub(crate) fn print_reports(reports: &[ShowReport]) {
    println!(
        "{:<28} {:>6} {:>10} {:>9} {:>6} {:>8}",
        "SHOW", "TOTAL", "DOWNLOADED", "NOT_FOUND", "ERROR", "PENDING"
    );
    for r in reports {
        let pending = r.total_episodes.saturating_sub(
            r.downloaded() + r.count(EpisodeStatus::NotFound) + r.count(EpisodeStatus::Error),
        );
        println!(
            "{:<28} {:>6} {:>10} {:>9} {:>6} {:>8}",
            label(r),
            r.total_episodes,
            r.downloaded(),
            r.count(EpisodeStatus::NotFound),
            r.count(EpisodeStatus::Error),
            pending
        );
    }
    for r in reports {
        if let Some(failure) = &r.failure {
            println!("\n{}: run aborted: {}", label(r), failure);
        }
        if !r.by_source.is_empty() {
            let sources: Vec<String> = r
                .by_source
                .iter()
                .map(|(tier, n)| format!("{}={}", tier.as_str(), n))
                .collect();
            println!("\n{} sources: {}", label(r), sources.join(" "));
        }
        if r.combined > 0 {
            println!("{}: combined {} multi-part episode(s)", label(r), r.combined);
        }
        for p in &r.problems {
            println!(
                "  {:<14} {:<10} {}{}",
                p.key,
                p.status.as_str(),
                p.title,
                p.reason
                    .as_deref()
                    .map(|why| format!(" ({})", why))
                    .unwrap_or_default()
            );
        }
    }
}
