//! Schedule generation: inventory -> blocks -> constrained shuffle -> timeline.

mod blocks;
mod shuffle;
mod timeline;

pub use blocks::{build_blocks, Block};
pub use shuffle::{constrained_shuffle, fisher_yates, interleave, repair_linear, repair_wrap, validate, ShuffleReport};
pub use timeline::{Airing, Schedule, TimelineEntry};

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::LoopcastConfig;
use crate::inventory::{InventoryEntry, InventoryScanner};
use crate::media::MediaProbe;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("no episodes on disk to schedule")]
    Empty,
    #[error("inventory scan failed: {0}")]
    Inventory(#[source] std::io::Error),
    #[error("failed to read schedule {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write schedule {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A generated schedule and its validation report.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub schedule: Schedule,
    pub report: ShuffleReport,
}

/// Build the schedule from an inventory. Shows keep the order in which they
/// first appear; each show's entries are ordered by (season, episode).
pub fn generate(
    mut inventory: Vec<InventoryEntry>,
    block_sizes: &[usize],
    seed: u64,
    generated_at: DateTime<Utc>,
) -> Result<Generated, ScheduleError> {
    if inventory.is_empty() {
        return Err(ScheduleError::Empty);
    }
    let mut order: Vec<String> = Vec::new();
    for e in &inventory {
        if !order.contains(&e.show_id) {
            order.push(e.show_id.clone());
        }
    }
    inventory.sort_by(|a, b| {
        let rank = |id: &str| order.iter().position(|o| o == id);
        rank(&a.show_id)
            .cmp(&rank(&b.show_id))
            .then(a.season.cmp(&b.season))
            .then(a.episode.cmp(&b.episode))
    });

    let queues: Vec<Vec<Block>> = order
        .iter()
        .map(|show_id| {
            let entries: Vec<InventoryEntry> = inventory
                .iter()
                .filter(|e| &e.show_id == show_id)
                .cloned()
                .collect();
            build_blocks(show_id, &entries, block_sizes)
        })
        .collect();

    let (blocks, report) = constrained_shuffle(queues, seed, |b: &Block| b.show_id.as_str());
    if report.violations > 0 {
        tracing::warn!(
            violations = report.violations,
            wrap = report.wrap_violation,
            blocks = report.total_blocks,
            "schedule has same-show neighbours"
        );
    }
    let schedule = Schedule::from_blocks(&blocks, generated_at);
    tracing::info!(
        entries = schedule.total_entries,
        blocks = report.total_blocks,
        cycle_ms = schedule.cycle_duration_ms,
        seed,
        "schedule generated"
    );
    Ok(Generated { schedule, report })
}

/// Scan the library and generate. `seed` overrides the configured seed.
pub async fn generate_from_library(
    cfg: &LoopcastConfig,
    state_dir: &Path,
    probe: &dyn MediaProbe,
    seed: Option<u64>,
    generated_at: DateTime<Utc>,
) -> Result<Generated, ScheduleError> {
    let scanner = InventoryScanner::new(probe, cfg.schedule.max_episode_ms());
    let inventory = scanner
        .scan_all(cfg, state_dir)
        .await
        .map_err(ScheduleError::Inventory)?;
    generate(
        inventory,
        &cfg.schedule.block_sizes,
        seed.unwrap_or(cfg.schedule.seed),
        generated_at,
    )
}

#[cfg(test)]
pub(crate) fn test_entry(show: &str, season: u32, episode: u32, minutes: u64) -> InventoryEntry {
    InventoryEntry {
        show_id: show.to_string(),
        show_name: show.to_string(),
        season,
        episode,
        episode_end: None,
        title: format!("{} {}x{:02}", show, season, episode),
        synopsis: None,
        thumbnail: None,
        file_path: PathBuf::from(format!("/media/{}/{}x{:02}.mkv", show, season, episode)),
        duration_ms: minutes * 60_000,
        multi_part: false,
        variant: false,
        linked_parts: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn empty_inventory_is_an_error() {
        assert!(matches!(generate(Vec::new(), &[3, 4], 1, at()), Err(ScheduleError::Empty)));
    }

    #[test]
    fn generate_is_deterministic_and_clean() {
        let mut inv = Vec::new();
        for show in ["a", "b", "c"] {
            for ep in 1..=8 {
                inv.push(test_entry(show, 1, ep, 22));
            }
        }
        let one = generate(inv.clone(), &[3, 4], 99, at()).unwrap();
        let two = generate(inv, &[3, 4], 99, at()).unwrap();
        assert_eq!(one, two);
        assert_eq!(one.report.violations, 0);
        assert_eq!(one.schedule.total_entries, 24);
        // blocks keep episode order within a show
        let a_eps: Vec<u32> = one
            .schedule
            .schedule
            .iter()
            .filter(|e| e.show == "a")
            .map(|e| e.episode)
            .collect();
        let mut sorted = a_eps.clone();
        sorted.sort();
        assert_eq!(a_eps.len(), 8);
        assert_eq!(sorted, (1..=8).collect::<Vec<_>>());
    }
}
