//! Schedule-time inventory: what is actually on disk, with measured durations.

mod scanner;

pub use scanner::{clamp_duration, InventoryScanner};

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::catalog::{Catalog, MultiPart};
use crate::config::ShowConfig;
use crate::parse::{self, EpisodeMarker};
use crate::state::{episode_key, StateDocument};
use crate::storage::LocatedFile;

/// One playable file. Not persisted; rebuilt on every schedule generation.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryEntry {
    pub show_id: String,
    pub show_name: String,
    pub season: u32,
    pub episode: u32,
    /// Last episode covered by a combined/range file.
    pub episode_end: Option<u32>,
    pub title: String,
    pub synopsis: Option<String>,
    pub thumbnail: Option<String>,
    pub file_path: PathBuf,
    pub duration_ms: u64,
    pub multi_part: bool,
    /// File name carries one of the show's preferred tags.
    pub variant: bool,
    /// Episodes of the same story still stored as separate files
    /// (set on an uncombined multi-part primary).
    pub linked_parts: Vec<u32>,
}

impl InventoryEntry {
    pub fn last_episode(&self) -> u32 {
        self.episode_end.unwrap_or(self.episode)
    }

    /// Number of catalog episodes this file covers.
    pub fn episode_count(&self) -> u32 {
        self.last_episode() - self.episode + 1
    }

    pub fn covers(&self, episode: u32) -> bool {
        (self.episode..=self.last_episode()).contains(&episode)
    }
}

/// Pick one file per episode and drop singles already covered by a range.
///
/// When several files start at the same episode, the preferred-tag variant
/// wins, then a range over a single, then the first by path.
pub fn select_files(show: &ShowConfig, files: Vec<LocatedFile>) -> Vec<(LocatedFile, bool)> {
    let mut by_start: BTreeMap<(u32, u32), (LocatedFile, bool)> = BTreeMap::new();
    for file in files {
        let variant = is_variant(show, &file);
        let key = (file.marker.season, file.marker.episode);
        let replace = match by_start.get(&key) {
            None => true,
            Some((held, held_variant)) => {
                (variant && !held_variant)
                    || (variant == *held_variant
                        && file.marker.last_episode() > held.marker.last_episode())
            }
        };
        if replace {
            by_start.insert(key, (file, variant));
        }
    }

    let ranges: Vec<EpisodeMarker> = by_start
        .values()
        .filter(|(f, _)| f.marker.episode_end.is_some())
        .map(|(f, _)| f.marker)
        .collect();
    by_start
        .into_values()
        .filter(|(f, _)| {
            let m = f.marker;
            !ranges.iter().any(|r| {
                *r != m && r.season == m.season && r.covers(m.episode) && r.covers(m.last_episode())
            })
        })
        .collect()
}

fn is_variant(show: &ShowConfig, file: &LocatedFile) -> bool {
    let name = file
        .path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    show.preferred_tags.iter().any(|t| parse::contains_tag(name, t))
}

/// Title from our own naming scheme (`Show - S01E02 - Title.ext`), if present.
fn title_from_file_name(file: &LocatedFile) -> String {
    let stem = file
        .path
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let mut parts = stem.splitn(3, " - ");
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(code), Some(title)) if parse::parse_episode(code).is_some() => title.to_string(),
        _ => String::new(),
    }
}

/// Attach catalog (or state) metadata to a located file. Duration is filled
/// in by the scanner.
pub fn describe(
    show: &ShowConfig,
    file: LocatedFile,
    variant: bool,
    catalog: Option<&Catalog>,
    state: Option<&StateDocument>,
) -> InventoryEntry {
    let m = file.marker;
    let entry = catalog.and_then(|c| c.get(m.season, m.episode));
    let record = state.and_then(|s| s.record(&episode_key(&show.id, m.season, m.episode)));

    let title = match (entry, m.episode_end) {
        (Some(e), Some(_)) => parse::strip_part_marker(&e.title),
        (Some(e), None) => e.title.clone(),
        (None, _) => record
            .map(|r| r.title.clone())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| title_from_file_name(&file)),
    };
    let synopsis = entry
        .map(|e| e.synopsis.clone())
        .filter(|s| !s.is_empty())
        .or_else(|| record.and_then(|r| r.synopsis.clone()));
    let thumbnail = entry
        .and_then(|e| e.thumbnail.clone())
        .or_else(|| record.and_then(|r| r.thumbnail.clone()));

    let linked_parts = match entry.and_then(|e| e.multi_part.as_ref()) {
        Some(MultiPart::Primary { episode_numbers, .. }) if m.episode_end.is_none() => {
            episode_numbers.iter().skip(1).copied().collect()
        }
        _ => Vec::new(),
    };
    let multi_part = m.episode_end.is_some() || entry.is_some_and(|e| e.multi_part.is_some());

    InventoryEntry {
        show_id: show.id.clone(),
        show_name: show.name.clone(),
        season: m.season,
        episode: m.episode,
        episode_end: m.episode_end,
        title,
        synopsis,
        thumbnail,
        file_path: file.path,
        duration_ms: 0,
        multi_part,
        variant,
        linked_parts,
    }
}
