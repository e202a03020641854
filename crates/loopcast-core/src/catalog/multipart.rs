//! Multi-part detection over consecutive catalog titles.

use super::{CatalogEntry, MultiPart};
use crate::parse::part_number;

/// How many following entries may continue a "Part 1" run.
pub const MAX_PART_LOOKAHEAD: usize = 3;

/// Link runs of "Part 1", "Part 2", ... within one season. Entries must be
/// sorted by (season, episode). A run stops at the first gap in numbering.
pub fn detect_multi_part(entries: &mut [CatalogEntry]) {
    let mut i = 0;
    while i < entries.len() {
        if part_number(&entries[i].title) != Some(1) {
            i += 1;
            continue;
        }
        let season = entries[i].season;
        let mut end = i + 1;
        let mut expected = 2;
        while end < entries.len()
            && end - i <= MAX_PART_LOOKAHEAD
            && entries[end].season == season
            && part_number(&entries[end].title) == Some(expected)
        {
            expected += 1;
            end += 1;
        }
        if end - i < 2 {
            i += 1;
            continue;
        }

        let primary = entries[i].episode;
        let episode_numbers: Vec<u32> = entries[i..end].iter().map(|e| e.episode).collect();
        tracing::debug!(
            show = %entries[i].show_id,
            season,
            episode = primary,
            parts = episode_numbers.len(),
            "multi-part episode detected"
        );
        entries[i].multi_part = Some(MultiPart::Primary {
            part_count: episode_numbers.len() as u32,
            episode_numbers,
        });
        for e in &mut entries[i + 1..end] {
            e.multi_part = Some(MultiPart::Secondary {
                primary_episode_number: primary,
            });
        }
        i = end;
    }
}
