//! Per-show directory layout: `<media_root>/<directory>/Season 01/<Show> - S01E02 - <Title>.<ext>`.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::sanitize::sanitize_filename_for_linux;
use crate::config::{LoopcastConfig, ShowConfig};
use crate::parse::{self, EpisodeMarker};

const ORIGINALS_DIR: &str = "originals";

pub fn season_dir_name(season: u32) -> String {
    format!("Season {:02}", season)
}

/// `S01E02`, or `S01E02-E04` for a range.
pub fn episode_code(season: u32, episode: u32, episode_end: Option<u32>) -> String {
    match episode_end {
        Some(end) if end > episode => format!("S{:02}E{:02}-E{:02}", season, episode, end),
        _ => format!("S{:02}E{:02}", season, episode),
    }
}

pub fn episode_file_name(show: &str, marker: &EpisodeMarker, title: &str, ext: &str) -> String {
    let code = episode_code(marker.season, marker.episode, marker.episode_end);
    let title = title.trim();
    let name = if title.is_empty() {
        format!("{} - {}.{}", show, code, ext)
    } else {
        format!("{} - {} - {}.{}", show, code, title, ext)
    };
    sanitize_filename_for_linux(&name)
}

/// A video file found under a season directory.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedFile {
    pub path: PathBuf,
    pub marker: EpisodeMarker,
}

#[derive(Debug, Clone)]
pub struct ShowLayout {
    root: PathBuf,
    show_name: String,
}

impl ShowLayout {
    pub fn new(root: impl Into<PathBuf>, show_name: &str) -> Self {
        Self {
            root: root.into(),
            show_name: show_name.to_string(),
        }
    }

    pub fn for_show(cfg: &LoopcastConfig, show: &ShowConfig) -> Self {
        Self::new(cfg.show_dir(show), &show.name)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn season_dir(&self, season: u32) -> PathBuf {
        self.root.join(season_dir_name(season))
    }

    /// Where replaced part files are moved after combining.
    pub fn originals_dir(&self, season: u32) -> PathBuf {
        self.root.join(ORIGINALS_DIR).join(season_dir_name(season))
    }

    pub fn episode_path(&self, marker: &EpisodeMarker, title: &str, ext: &str) -> PathBuf {
        self.season_dir(marker.season)
            .join(episode_file_name(&self.show_name, marker, title, ext))
    }

    /// Season directories (any `Season N` / `SNN` spelling), sorted by season.
    pub fn season_dirs(&self) -> io::Result<Vec<(u32, PathBuf)>> {
        let rd = match fs::read_dir(&self.root) {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut dirs = Vec::new();
        for entry in rd {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(season) = name.to_str().and_then(parse::season_from_dir_name) {
                dirs.push((season, entry.path()));
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    /// Every parseable video file in the season directories, sorted by path.
    /// Unparseable names are logged and skipped.
    pub fn video_files(&self) -> io::Result<Vec<LocatedFile>> {
        let mut out = Vec::new();
        for (season, dir) in self.season_dirs()? {
            let mut paths: Vec<PathBuf> = fs::read_dir(&dir)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && parse::is_video_path(p))
                .collect();
            paths.sort();
            for path in paths {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default();
                match parse::parse_episode_with_season(name, Some(season)) {
                    Some(marker) => out.push(LocatedFile { path, marker }),
                    None => tracing::debug!(path = %path.display(), "no episode marker, skipping"),
                }
            }
        }
        Ok(out)
    }

    /// Scan the season directories once for lookups by episode.
    pub fn disk_index(&self) -> io::Result<DiskIndex> {
        Ok(DiskIndex::from_files(self.video_files()?))
    }
}

/// Episode files already on disk, keyed by (season, episode). A range file
/// answers for every episode it covers; the first file by path wins.
#[derive(Debug, Clone, Default)]
pub struct DiskIndex {
    by_episode: HashMap<(u32, u32), PathBuf>,
}

impl DiskIndex {
    pub fn from_files(files: Vec<LocatedFile>) -> Self {
        let mut by_episode = HashMap::new();
        for f in files {
            let last = f.marker.episode_end.unwrap_or(f.marker.episode).max(f.marker.episode);
            for ep in f.marker.episode..=last {
                by_episode.entry((f.marker.season, ep)).or_insert_with(|| f.path.clone());
            }
        }
        Self { by_episode }
    }

    pub fn find(&self, season: u32, episode: u32) -> Option<&Path> {
        self.by_episode.get(&(season, episode)).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.by_episode.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_episode.is_empty()
    }
}
