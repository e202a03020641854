//! Timeline emitter: flatten ordered blocks into offsets on one repeating cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{Block, ScheduleError};
use crate::storage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub index: usize,
    pub start_offset_ms: u64,
    pub duration_ms: u64,
    /// Display name of the show.
    pub show: String,
    pub season: u32,
    pub episode: u32,
    pub episode_end: Option<u32>,
    pub title: String,
    pub synopsis: Option<String>,
    pub thumbnail: Option<String>,
    pub file_path: PathBuf,
    pub episode_count: u32,
    pub variant_flag: bool,
    pub block_id: String,
}

impl TimelineEntry {
    pub fn end_offset_ms(&self) -> u64 {
        self.start_offset_ms + self.duration_ms
    }
}

/// The persisted schedule document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub generated_at: DateTime<Utc>,
    pub cycle_duration_ms: u64,
    pub total_entries: usize,
    pub schedule: Vec<TimelineEntry>,
}

/// What is on air at a given wall-clock instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Airing<'a> {
    pub entry: &'a TimelineEntry,
    /// Position inside the entry.
    pub elapsed_ms: u64,
    pub remaining_ms: u64,
}

impl Schedule {
    pub fn from_blocks(blocks: &[Block], generated_at: DateTime<Utc>) -> Self {
        let mut offset = 0u64;
        let mut schedule = Vec::new();
        for block in blocks {
            for e in &block.entries {
                schedule.push(TimelineEntry {
                    index: schedule.len(),
                    start_offset_ms: offset,
                    duration_ms: e.duration_ms,
                    show: e.show_name.clone(),
                    season: e.season,
                    episode: e.episode,
                    episode_end: e.episode_end,
                    title: e.title.clone(),
                    synopsis: e.synopsis.clone(),
                    thumbnail: e.thumbnail.clone(),
                    file_path: e.file_path.clone(),
                    episode_count: e.episode_count(),
                    variant_flag: e.variant,
                    block_id: block.id.clone(),
                });
                offset += e.duration_ms;
            }
        }
        Schedule {
            generated_at,
            cycle_duration_ms: offset,
            total_entries: schedule.len(),
            schedule,
        }
    }

    /// Entry airing at `wall_clock_ms` (ms since the Unix epoch):
    /// `wall_clock_ms mod cycleDurationMs` picks the position in the cycle.
    pub fn entry_at(&self, wall_clock_ms: u64) -> Option<Airing<'_>> {
        if self.cycle_duration_ms == 0 {
            return None;
        }
        let now = wall_clock_ms % self.cycle_duration_ms;
        let idx = self
            .schedule
            .partition_point(|e| e.start_offset_ms <= now)
            .checked_sub(1)?;
        let entry = &self.schedule[idx];
        let elapsed_ms = now - entry.start_offset_ms;
        Some(Airing {
            entry,
            elapsed_ms,
            remaining_ms: entry.duration_ms.saturating_sub(elapsed_ms),
        })
    }

    pub fn persist(&self, path: &Path) -> Result<(), ScheduleError> {
        storage::write_json_atomic(path, self).map_err(|source| ScheduleError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Option<Self>, ScheduleError> {
        storage::read_json_opt(path).map_err(|source| ScheduleError::Read {
            path: path.to_path_buf(),
            source,
        })
    }
}
