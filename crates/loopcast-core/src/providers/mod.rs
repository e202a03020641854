//! Contracts for the external collaborators: metadata, instant lookup,
//! indexer search and the cached-download ("cache") provider.
//!
//! Concrete services live outside this crate. [`command::CommandProvider`]
//! bridges to helper programs that speak JSON over stdin/stdout.

pub mod command;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::parse::{self, PackType};
use crate::retry::{ErrorKind, Retryable};

/// Failure reported by a provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Temporary outage, timeout or dropped connection; worth retrying.
    #[error("transient: {0}")]
    Transient(String),
    /// Provider asked us to slow down.
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// The provider has nothing for this request.
    #[error("not found: {0}")]
    NotFound(String),
    /// The provider answered, but the answer is unusable (bad pack, failed processing).
    #[error("content: {0}")]
    Content(String),
    /// Missing credentials or helper program.
    #[error("configuration: {0}")]
    Configuration(String),
    /// Malformed response.
    #[error("protocol: {0}")]
    Protocol(String),
}

impl Retryable for ProviderError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            ProviderError::Transient(_) => ErrorKind::Connection,
            ProviderError::RateLimited(_) => ErrorKind::Throttled,
            _ => ErrorKind::Other,
        }
    }
}

/// Show title and the seasons the metadata provider knows about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesInfo {
    pub title: String,
    pub seasons: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeMetadata {
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub synopsis: String,
    #[serde(default)]
    pub runtime_minutes: Option<u32>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub air_date: Option<String>,
}

/// Scope of an indexer search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SearchScope {
    Series,
    Season { season: u32 },
    Episode { season: u32, episode: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub title: String,
    pub year: Option<u16>,
    pub scope: SearchScope,
}

/// One indexer result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCandidate {
    pub title: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub seeders: u32,
    /// Opaque locator handed to the cache provider (e.g. a magnet link).
    pub locator: String,
}

impl SourceCandidate {
    pub fn pack_type(&self) -> Option<PackType> {
        parse::pack_type(&self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantQuery {
    pub title: String,
    pub year: Option<u16>,
    pub season: u32,
    pub episode: u32,
    pub runtime_minutes: Option<u32>,
}

/// A file the instant-lookup provider can hand over immediately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantFile {
    pub path: PathBuf,
    #[serde(default)]
    pub size_bytes: u64,
}

/// Instant lookup answer: an exact match and/or a looser fallback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantLookup {
    pub best: Option<InstantFile>,
    pub fallback: Option<InstantFile>,
}

impl InstantLookup {
    pub fn pick(self) -> Option<InstantFile> {
        self.best.or(self.fallback)
    }
}

/// Handle of a pack committed to the cache provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackHandle(pub String);

impl std::fmt::Display for PackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file inside a committed pack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackFile {
    pub id: u64,
    /// Path inside the pack, possibly with folders (`Show/Season 1/file.mkv`).
    pub path: String,
    #[serde(default)]
    pub bytes: u64,
}

impl PackFile {
    pub fn file_name(&self) -> &str {
        self.path.rsplit(['/', '\\']).next().unwrap_or(&self.path)
    }

    /// Season implied by a `Season N` folder in the pack path, if any.
    pub fn folder_season(&self) -> Option<u32> {
        self.path
            .split(['/', '\\'])
            .rev()
            .skip(1)
            .find_map(parse::season_from_dir_name)
    }

    pub fn is_video(&self) -> bool {
        parse::is_video_path(std::path::Path::new(self.file_name()))
    }
}

/// Processing state of a committed pack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum CacheStatus {
    Processing {
        #[serde(default)]
        progress: Option<f32>,
    },
    /// Links in the same order as the selected file ids (ascending).
    Ready { links: Vec<String> },
    Failed { reason: String },
}

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn series(&self, show_id: &str) -> Result<SeriesInfo, ProviderError>;
    async fn season(&self, show_id: &str, season: u32) -> Result<Vec<EpisodeMetadata>, ProviderError>;
}

#[async_trait]
pub trait InstantLookupProvider: Send + Sync {
    async fn lookup(&self, query: &InstantQuery) -> Result<InstantLookup, ProviderError>;
}

#[async_trait]
pub trait IndexerProvider: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SourceCandidate>, ProviderError>;
}

#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Commit a locator; rate-limited by the caller.
    async fn add(&self, locator: &str) -> Result<PackHandle, ProviderError>;
    async fn files(&self, handle: &PackHandle) -> Result<Vec<PackFile>, ProviderError>;
    async fn select(&self, handle: &PackHandle, file_ids: &[u64]) -> Result<(), ProviderError>;
    async fn status(&self, handle: &PackHandle) -> Result<CacheStatus, ProviderError>;
    /// Turn a pack link into a direct download URL.
    async fn resolve(&self, link: &str) -> Result<String, ProviderError>;
}

/// The provider set an acquisition run works against.
#[derive(Clone)]
pub struct Providers {
    pub metadata: Arc<dyn MetadataProvider>,
    pub instant: Option<Arc<dyn InstantLookupProvider>>,
    pub indexer: Arc<dyn IndexerProvider>,
    pub cache: Arc<dyn CacheProvider>,
}
