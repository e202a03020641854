//! In-memory providers with call counters.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use loopcast_core::media::{MediaError, MediaProbe, MediaRemuxer, ProbeReport};
use loopcast_core::providers::{
    CacheProvider, CacheStatus, EpisodeMetadata, IndexerProvider, InstantFile, InstantLookup,
    InstantLookupProvider, InstantQuery, MetadataProvider, PackFile, PackHandle, ProviderError,
    Providers, SearchQuery, SearchScope, SeriesInfo, SourceCandidate,
};

#[derive(Default)]
pub struct Counter(AtomicUsize);

impl Counter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// One show; seasons of titled episodes.
#[derive(Default)]
pub struct FakeMetadata {
    pub title: String,
    pub seasons: Vec<(u32, Vec<&'static str>)>,
    pub calls: Counter,
}

impl FakeMetadata {
    pub fn new(title: &str, seasons: Vec<(u32, Vec<&'static str>)>) -> Self {
        Self {
            title: title.to_string(),
            seasons,
            calls: Counter::default(),
        }
    }
}

#[async_trait]
impl MetadataProvider for FakeMetadata {
    async fn series(&self, _show_id: &str) -> Result<SeriesInfo, ProviderError> {
        self.calls.hit();
        Ok(SeriesInfo {
            title: self.title.clone(),
            seasons: self.seasons.iter().map(|(s, _)| *s).collect(),
        })
    }

    async fn season(&self, _show_id: &str, season: u32) -> Result<Vec<EpisodeMetadata>, ProviderError> {
        self.calls.hit();
        let titles = self
            .seasons
            .iter()
            .find(|(s, _)| *s == season)
            .map(|(_, t)| t.clone())
            .ok_or_else(|| ProviderError::NotFound(format!("season {}", season)))?;
        Ok(titles
            .into_iter()
            .enumerate()
            .map(|(i, title)| EpisodeMetadata {
                number: i as u32 + 1,
                title: title.to_string(),
                synopsis: format!("{} synopsis", title),
                runtime_minutes: Some(22),
                thumbnail: None,
                air_date: None,
            })
            .collect())
    }
}

/// Candidates by scope (release season numbering). `outage` fails every search.
#[derive(Default)]
pub struct FakeIndexer {
    pub series: Vec<SourceCandidate>,
    pub seasons: HashMap<u32, Vec<SourceCandidate>>,
    pub episodes: HashMap<(u32, u32), Vec<SourceCandidate>>,
    pub outage: Option<&'static str>,
    pub scopes: Mutex<Vec<SearchScope>>,
    pub calls: Counter,
}

impl FakeIndexer {
    pub fn searched(&self, scope: SearchScope) -> bool {
        self.scopes.lock().unwrap().contains(&scope)
    }
}

#[async_trait]
impl IndexerProvider for FakeIndexer {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SourceCandidate>, ProviderError> {
        self.calls.hit();
        self.scopes.lock().unwrap().push(query.scope);
        if let Some(reason) = self.outage {
            return Err(ProviderError::Transient(reason.to_string()));
        }
        let hits = match query.scope {
            SearchScope::Series => self.series.clone(),
            SearchScope::Season { season } => self.seasons.get(&season).cloned().unwrap_or_default(),
            SearchScope::Episode { season, episode } => {
                self.episodes.get(&(season, episode)).cloned().unwrap_or_default()
            }
        };
        Ok(hits)
    }
}

pub fn candidate(title: &str, seeders: u32) -> SourceCandidate {
    SourceCandidate {
        title: title.to_string(),
        size_bytes: 1 << 30,
        seeders,
        locator: format!("magnet:{}", title),
    }
}

/// Packs keyed by locator; each file carries the direct URL it resolves to.
/// Packs in `truncated` report one link fewer than the files selected.
#[derive(Default)]
pub struct FakeCache {
    pub packs: HashMap<String, Vec<(PackFile, String)>>,
    pub truncated: HashSet<String>,
    pub selected: Mutex<HashMap<String, Vec<u64>>>,
    pub adds: Counter,
    pub calls: Counter,
}

impl FakeCache {
    pub fn insert(&mut self, locator: &str, files: Vec<(u64, &str, String)>) {
        let files = files
            .into_iter()
            .map(|(id, path, url)| {
                (
                    PackFile {
                        id,
                        path: path.to_string(),
                        bytes: 1000,
                    },
                    url,
                )
            })
            .collect();
        self.packs.insert(locator.to_string(), files);
    }

    fn pack(&self, handle: &PackHandle) -> Result<&Vec<(PackFile, String)>, ProviderError> {
        self.packs
            .get(&handle.0)
            .ok_or_else(|| ProviderError::Content(format!("unknown handle {}", handle)))
    }
}

#[async_trait]
impl CacheProvider for FakeCache {
    async fn add(&self, locator: &str) -> Result<PackHandle, ProviderError> {
        self.adds.hit();
        self.calls.hit();
        if self.packs.contains_key(locator) {
            Ok(PackHandle(locator.to_string()))
        } else {
            Err(ProviderError::Content(format!("dead source {}", locator)))
        }
    }

    async fn files(&self, handle: &PackHandle) -> Result<Vec<PackFile>, ProviderError> {
        self.calls.hit();
        Ok(self.pack(handle)?.iter().map(|(f, _)| f.clone()).collect())
    }

    async fn select(&self, handle: &PackHandle, file_ids: &[u64]) -> Result<(), ProviderError> {
        self.calls.hit();
        self.selected
            .lock()
            .unwrap()
            .insert(handle.0.clone(), file_ids.to_vec());
        Ok(())
    }

    async fn status(&self, handle: &PackHandle) -> Result<CacheStatus, ProviderError> {
        self.calls.hit();
        let mut ids = self
            .selected
            .lock()
            .unwrap()
            .get(&handle.0)
            .cloned()
            .unwrap_or_default();
        ids.sort_unstable();
        if self.truncated.contains(&handle.0) {
            ids.pop();
        }
        let links = ids.iter().map(|id| format!("{}#{}", handle.0, id)).collect();
        Ok(CacheStatus::Ready { links })
    }

    async fn resolve(&self, link: &str) -> Result<String, ProviderError> {
        self.calls.hit();
        let (locator, id) = link
            .rsplit_once('#')
            .ok_or_else(|| ProviderError::Protocol(format!("bad link {}", link)))?;
        let id: u64 = id.parse().map_err(|_| ProviderError::Protocol(link.to_string()))?;
        self.pack(&PackHandle(locator.to_string()))?
            .iter()
            .find(|(f, _)| f.id == id)
            .map(|(_, url)| url.clone())
            .ok_or_else(|| ProviderError::Content(format!("no file {} in {}", id, locator)))
    }
}

/// Instant library: (season, episode) -> local file.
#[derive(Default)]
pub struct FakeInstant {
    pub files: HashMap<(u32, u32), PathBuf>,
    pub calls: Counter,
}

#[async_trait]
impl InstantLookupProvider for FakeInstant {
    async fn lookup(&self, query: &InstantQuery) -> Result<InstantLookup, ProviderError> {
        self.calls.hit();
        Ok(InstantLookup {
            best: self.files.get(&(query.season, query.episode)).map(|p| InstantFile {
                path: p.clone(),
                size_bytes: 0,
            }),
            fallback: None,
        })
    }
}

/// Byte-level concatenation in place of ffmpeg.
pub struct CatRemuxer;

#[async_trait]
impl MediaRemuxer for CatRemuxer {
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<(), MediaError> {
        let mut data = Vec::new();
        for input in inputs {
            data.extend(std::fs::read(input)?);
        }
        std::fs::write(output, data)?;
        Ok(())
    }
}

/// Container duration in seconds by file-name substring; `default_secs` otherwise.
pub struct FakeProbe {
    pub durations: Vec<(&'static str, &'static str)>,
    pub default_secs: Option<&'static str>,
}

#[async_trait]
impl MediaProbe for FakeProbe {
    async fn probe(&self, path: &Path) -> Result<ProbeReport, MediaError> {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        let secs = self
            .durations
            .iter()
            .find(|(needle, _)| name.contains(needle))
            .map(|(_, d)| *d)
            .or(self.default_secs);
        let mut report = ProbeReport::default();
        report.format.duration = secs.map(str::to_string);
        Ok(report)
    }
}

pub struct Fakes {
    pub metadata: Arc<FakeMetadata>,
    pub indexer: Arc<FakeIndexer>,
    pub cache: Arc<FakeCache>,
    pub instant: Option<Arc<FakeInstant>>,
}

impl Fakes {
    pub fn providers(&self) -> Providers {
        Providers {
            metadata: self.metadata.clone(),
            instant: self
                .instant
                .clone()
                .map(|i| i as Arc<dyn InstantLookupProvider>),
            indexer: self.indexer.clone(),
            cache: self.cache.clone(),
        }
    }

    /// Every provider call made so far.
    pub fn total_calls(&self) -> usize {
        self.metadata.calls.get()
            + self.indexer.calls.get()
            + self.cache.calls.get()
            + self.instant.as_ref().map_or(0, |i| i.calls.get())
    }
}
