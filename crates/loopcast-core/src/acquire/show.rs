//! One show's acquisition pass: decide which tiers to run and drive them.

use std::path::{Path, PathBuf};

use super::{AcquireError, Acquirer};
use crate::catalog::{Catalog, CatalogEntry};
use crate::config::ShowConfig;
use crate::executor::{ActiveTransfers, DownloadTask};
use crate::parse::{self, EpisodeMarker, PackType};
use crate::providers::{CacheStatus, PackHandle, ProviderError, SearchQuery, SearchScope, SourceCandidate};
use crate::retry::retry_async;
use crate::scorer::{self, ScoredCandidate};
use crate::state::{SourceTier, StateStore, Transition};
use crate::storage::ShowLayout;

/// A resolved file to fetch and the catalog entries it satisfies.
pub(super) struct PlannedDownload<'c> {
    pub entries: Vec<&'c CatalogEntry>,
    pub link: String,
    pub file_name: String,
}

pub(super) struct ShowRun<'a> {
    pub ctx: &'a Acquirer,
    pub show: &'a ShowConfig,
    pub catalog: &'a Catalog,
    pub layout: ShowLayout,
    pub store: StateStore,
    pub active: ActiveTransfers,
    pub keep_not_found: bool,
}

impl<'a> ShowRun<'a> {
    pub fn needed(&self) -> Vec<&'a CatalogEntry> {
        self.store.needed(self.catalog, self.keep_not_found)
    }

    pub async fn execute(&mut self) -> Result<(), AcquireError> {
        if self.needed().is_empty() {
            tracing::info!(show = %self.show.id, "all episodes present, nothing to acquire");
            return Ok(());
        }
        self.series_tier().await?;
        self.season_tier().await?;
        let needed = self.needed();
        if needed.is_empty() {
            return Ok(());
        }
        let on_disk = self.layout.disk_index()?;
        for entry in needed {
            self.individual(entry, &on_disk).await?;
        }
        Ok(())
    }

    async fn series_tier(&mut self) -> Result<(), AcquireError> {
        let needed = self.needed().len();
        let total = self.catalog.len();
        let threshold = self.ctx.cfg.acquisition.series_threshold;
        if (needed as f64) <= threshold * total as f64 {
            tracing::debug!(show = %self.show.id, needed, total, "series pack not worthwhile");
            return Ok(());
        }
        tracing::info!(show = %self.show.id, needed, total, "trying series packs");
        let ranked = self
            .ranked(SearchScope::Series, |c| c.pack_type == Some(PackType::Series))
            .await;
        match pack_search(ranked, self.show, "series")? {
            Some(ranked) => self.try_packs(ranked, SourceTier::SeriesPack).await,
            None => Ok(()),
        }
    }

    async fn season_tier(&mut self) -> Result<(), AcquireError> {
        let threshold = self.ctx.cfg.acquisition.season_threshold;
        for season in self.catalog.seasons() {
            let total = self.catalog.season_entries(season).count();
            let missing = self.needed().iter().filter(|e| e.season == season).count();
            if missing == 0 || (missing as f64) < threshold * total as f64 {
                continue;
            }
            let release = self.show.release_season(season);
            tracing::info!(show = %self.show.id, season, release, missing, total, "trying season packs");
            let ranked = self
                .ranked(SearchScope::Season { season: release }, |c| {
                    c.pack_type == Some(PackType::Season)
                        && parse::pack_season(&c.candidate.title) == Some(release)
                })
                .await;
            if let Some(ranked) = pack_search(ranked, self.show, "season")? {
                self.try_packs(ranked, SourceTier::SeasonPack).await?;
            }
        }
        Ok(())
    }

    /// Walk the best pack candidates until one maps at least one needed episode.
    async fn try_packs(&mut self, ranked: Vec<ScoredCandidate>, tier: SourceTier) -> Result<(), AcquireError> {
        let attempts = self.ctx.cfg.acquisition.pack_attempts;
        for cand in ranked.iter().take(attempts) {
            match self.attempt_pack(&cand.candidate, tier).await {
                Ok(0) => {
                    tracing::info!(show = %self.show.id, pack = %cand.candidate.title, "pack matched no needed episodes");
                }
                Ok(mapped) => {
                    tracing::info!(show = %self.show.id, pack = %cand.candidate.title, mapped, tier = tier.as_str(), "pack used");
                    return Ok(());
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(AcquireError::State(e)) => return Err(AcquireError::State(e)),
                Err(e) => {
                    tracing::warn!(show = %self.show.id, pack = %cand.candidate.title, "pack failed: {}", e);
                }
            }
        }
        Ok(())
    }

    /// Search every title the show is known by and rank the union.
    ///
    /// An empty list means the indexer answered and had nothing. When no
    /// title got an answer at all, the last search error is returned.
    pub async fn ranked<F>(&self, scope: SearchScope, keep: F) -> Result<Vec<ScoredCandidate>, AcquireError>
    where
        F: Fn(&ScoredCandidate) -> bool,
    {
        let indexer = &*self.ctx.providers.indexer;
        let mut found: Vec<SourceCandidate> = Vec::new();
        let mut answered = false;
        let mut last_error = None;
        for title in self.show.search_titles() {
            let query = SearchQuery {
                title: title.to_string(),
                year: self.show.year,
                scope,
            };
            match retry_async(&self.ctx.retry, "indexer.search", || indexer.search(&query)).await {
                Ok(mut hits) => {
                    answered = true;
                    found.append(&mut hits);
                }
                Err(ProviderError::NotFound(_)) => answered = true,
                Err(ProviderError::Configuration(m)) => return Err(AcquireError::Configuration(m)),
                Err(e) => {
                    tracing::warn!(show = %self.show.id, title, "search failed: {}", e);
                    last_error = Some(e);
                }
            }
        }
        if let (false, Some(e)) = (answered, last_error) {
            return Err(e.into());
        }
        let ranked: Vec<ScoredCandidate> = scorer::rank(found, &self.show.preferred_tags)
            .into_iter()
            .filter(|c| keep(c))
            .collect();
        tracing::debug!(show = %self.show.id, scope = ?scope, candidates = ranked.len(), "search ranked");
        Ok(ranked)
    }

    /// Commit a source to the cache provider, spaced by the submission throttle.
    pub async fn commit(&self, locator: &str) -> Result<PackHandle, AcquireError> {
        let cache = &*self.ctx.providers.cache;
        let throttle = &self.ctx.throttle;
        let handle = retry_async(&self.ctx.retry, "cache.add", || async move {
            throttle.wait().await;
            cache.add(locator).await
        })
        .await?;
        tracing::debug!(show = %self.show.id, %handle, "source committed");
        Ok(handle)
    }

    /// Poll until the committed source is ready and return its access links.
    pub async fn wait_ready(&self, handle: &PackHandle) -> Result<Vec<String>, AcquireError> {
        let cache = &*self.ctx.providers.cache;
        let acq = &self.ctx.cfg.acquisition;
        let deadline = tokio::time::Instant::now() + acq.ready_timeout();
        loop {
            match retry_async(&self.ctx.retry, "cache.status", || cache.status(handle)).await? {
                CacheStatus::Ready { links } => return Ok(links),
                CacheStatus::Failed { reason } => {
                    return Err(AcquireError::Content(format!("{} failed: {}", handle, reason)))
                }
                CacheStatus::Processing { progress } => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(AcquireError::Transient(format!(
                            "{} not ready after {}s",
                            handle, acq.ready_timeout_secs
                        )));
                    }
                    tracing::debug!(%handle, progress = ?progress, "waiting for cache provider");
                    tokio::time::sleep(acq.poll_interval()).await;
                }
            }
        }
    }

    /// Mark entries downloading, resolve links, run the pool and record outcomes.
    /// Returns how many episodes ended up downloaded.
    pub async fn download(&mut self, planned: Vec<PlannedDownload<'a>>, tier: SourceTier) -> Result<usize, AcquireError> {
        if planned.is_empty() {
            return Ok(0);
        }
        self.store.transition_many(
            planned
                .iter()
                .flat_map(|p| p.entries.iter().map(|e| (*e, Transition::Downloading))),
        )?;

        let cache = &*self.ctx.providers.cache;
        let mut tasks = Vec::with_capacity(planned.len());
        let mut by_id = std::collections::HashMap::new();
        for p in planned {
            let id = p.entries[0].key();
            match retry_async(&self.ctx.retry, "cache.resolve", || cache.resolve(&p.link)).await {
                Ok(url) => {
                    if let Err(e) = url::Url::parse(&url) {
                        let reason = format!("cache provider returned bad url {:?}: {}", url, e);
                        self.fail_all(&p.entries, &reason)?;
                        continue;
                    }
                    tasks.push(DownloadTask {
                        id: id.clone(),
                        url,
                        destination: self.destination(&p.entries, &p.file_name),
                    });
                    by_id.insert(id, p.entries);
                }
                Err(ProviderError::Configuration(m)) => return Err(AcquireError::Configuration(m)),
                Err(e) => self.fail_all(&p.entries, &format!("resolve failed: {}", e))?,
            }
        }

        let mut downloaded = 0;
        for outcome in self.ctx.executor.run(tasks, &mut self.active).await {
            let Some(entries) = by_id.remove(&outcome.id) else {
                continue;
            };
            match outcome.result {
                Ok(bytes) => {
                    tracing::info!(
                        show = %self.show.id,
                        file = %outcome.destination.display(),
                        bytes,
                        "episode downloaded"
                    );
                    downloaded += entries.len();
                    self.store.transition_many(entries.iter().map(|e| {
                        (
                            *e,
                            Transition::Downloaded {
                                path: outcome.destination.clone(),
                                source: tier,
                            },
                        )
                    }))?;
                }
                Err(e) => {
                    tracing::warn!(show = %self.show.id, id = %outcome.id, "transfer failed: {}", e);
                    self.fail_all(&entries, &format!("transfer failed: {}", e))?;
                }
            }
        }
        Ok(downloaded)
    }

    fn fail_all(&mut self, entries: &[&'a CatalogEntry], reason: &str) -> Result<(), AcquireError> {
        self.store.transition_many(entries.iter().map(|e| {
            (
                *e,
                Transition::Failed {
                    reason: reason.to_string(),
                },
            )
        }))?;
        Ok(())
    }

    /// Library path for a file covering `entries` (one episode or a contiguous range).
    pub fn destination(&self, entries: &[&CatalogEntry], source_name: &str) -> PathBuf {
        let first = entries[0];
        let last = entries.iter().map(|e| e.episode).max().unwrap_or(first.episode);
        let marker = EpisodeMarker {
            season: first.season,
            episode: first.episode,
            episode_end: (last > first.episode).then_some(last),
        };
        let title = if entries.len() > 1 {
            parse::strip_part_marker(&first.title)
        } else {
            first.title.clone()
        };
        self.layout.episode_path(&marker, &title, &extension(source_name))
    }
}

/// A failed pack search skips the tier; individual episodes still get tried.
fn pack_search(
    ranked: Result<Vec<ScoredCandidate>, AcquireError>,
    show: &ShowConfig,
    tier: &str,
) -> Result<Option<Vec<ScoredCandidate>>, AcquireError> {
    match ranked {
        Ok(ranked) => Ok(Some(ranked)),
        Err(e) if e.is_fatal() => Err(e),
        Err(AcquireError::State(e)) => Err(AcquireError::State(e)),
        Err(e) => {
            tracing::warn!(show = %show.id, tier, "pack search failed, skipping tier: {}", e);
            Ok(None)
        }
    }
}

/// Lowercased extension of a source file name, `mkv` when absent.
pub(super) fn extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "mkv".to_string())
}
