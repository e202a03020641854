//! Filename and release-title parsing.
//!
//! Everything here is pure string work: episode markers (`S01E02`, `1x02`,
//! ranges), multi-part title markers, pack classification and quality tokens.

mod episode;
mod part;
mod release;

pub use episode::{parse_episode, parse_episode_with_season, season_from_dir_name, EpisodeMarker};
pub use part::{part_number, strip_part_marker};
pub use release::{pack_season, pack_type, quality, PackType, Quality};

use std::path::Path;

/// Container extensions treated as playable video.
pub const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "m4v", "avi", "mov", "ts", "webm", "wmv"];

/// True when the path has a known video extension (case-insensitive).
pub fn is_video_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Case-insensitive substring test used for preferred release tags.
pub fn contains_tag(haystack: &str, tag: &str) -> bool {
    let tag = tag.trim();
    !tag.is_empty() && haystack.to_lowercase().contains(&tag.to_lowercase())
}
