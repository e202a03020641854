//! Per-show acquisition state.
//!
//! One JSON document per show: `{title, totalEpisodes, episodes: {key -> record}}`.
//! "Pending" is the absence of a record.

mod store;

pub use store::StateStore;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::catalog::{Catalog, CatalogEntry};

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write state {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// State document key for one episode: `<show>:s01e02`.
pub fn episode_key(show_id: &str, season: u32, episode: u32) -> String {
    format!("{}:s{:02}e{:02}", show_id, season, episode)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeStatus {
    Searching,
    Downloading,
    Downloaded,
    Error,
    NotFound,
}

impl EpisodeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EpisodeStatus::Searching => "searching",
            EpisodeStatus::Downloading => "downloading",
            EpisodeStatus::Downloaded => "downloaded",
            EpisodeStatus::Error => "error",
            EpisodeStatus::NotFound => "not_found",
        }
    }
}

/// Which acquisition tier supplied a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    SeriesPack,
    SeasonPack,
    Instant,
    Individual,
    /// Already on disk (supplied by an earlier pack or placed by hand).
    Disk,
}

impl SourceTier {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceTier::SeriesPack => "series_pack",
            SourceTier::SeasonPack => "season_pack",
            SourceTier::Instant => "instant",
            SourceTier::Individual => "individual",
            SourceTier::Disk => "disk",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub status: EpisodeStatus,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synopsis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusRecord {
    fn from_entry(entry: &CatalogEntry, status: EpisodeStatus) -> Self {
        Self {
            status,
            title: entry.title.clone(),
            file_path: None,
            runtime: entry.runtime_minutes,
            synopsis: (!entry.synopsis.is_empty()).then(|| entry.synopsis.clone()),
            thumbnail: entry.thumbnail.clone(),
            source: None,
            error: None,
        }
    }
}

/// A state change for one episode.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Searching,
    Downloading,
    Downloaded { path: PathBuf, source: SourceTier },
    Failed { reason: String },
    NotFound { reason: String },
    /// File moved (e.g. parts combined into one file); status and source kept.
    Relocated { path: PathBuf },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDocument {
    pub title: String,
    pub total_episodes: usize,
    pub episodes: BTreeMap<String, StatusRecord>,
}

impl StateDocument {
    pub fn record(&self, key: &str) -> Option<&StatusRecord> {
        self.episodes.get(key)
    }

    pub fn status(&self, key: &str) -> Option<EpisodeStatus> {
        self.record(key).map(|r| r.status)
    }

    /// Apply a transition; returns false when the record was already in that state.
    pub fn apply(&mut self, entry: &CatalogEntry, transition: Transition) -> bool {
        let key = entry.key();
        let before = self.episodes.get(&key).cloned();
        let record = self
            .episodes
            .entry(key)
            .or_insert_with(|| StatusRecord::from_entry(entry, EpisodeStatus::Searching));
        record.title = entry.title.clone();
        match transition {
            Transition::Searching => {
                record.status = EpisodeStatus::Searching;
                record.error = None;
            }
            Transition::Downloading => {
                record.status = EpisodeStatus::Downloading;
                record.error = None;
            }
            Transition::Downloaded { path, source } => {
                record.status = EpisodeStatus::Downloaded;
                record.file_path = Some(path);
                record.source = Some(source);
                record.error = None;
            }
            Transition::Failed { reason } => {
                record.status = EpisodeStatus::Error;
                record.error = Some(reason);
            }
            Transition::NotFound { reason } => {
                record.status = EpisodeStatus::NotFound;
                record.error = Some(reason);
            }
            Transition::Relocated { path } => {
                record.file_path = Some(path);
            }
        }
        before.as_ref() != Some(record)
    }

    /// Catalog entries that still need acquisition. `keep_not_found` leaves
    /// terminal `not_found` records alone (resume mode).
    pub fn needed<'a>(&self, catalog: &'a Catalog, keep_not_found: bool) -> Vec<&'a CatalogEntry> {
        catalog
            .entries
            .iter()
            .filter(|e| match self.status(&e.key()) {
                Some(EpisodeStatus::Downloaded) => false,
                Some(EpisodeStatus::NotFound) => !keep_not_found,
                _ => true,
            })
            .collect()
    }
}
