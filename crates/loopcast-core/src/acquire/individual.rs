//! Last tier: one episode at a time, instant library first, then the indexer.

use super::show::{extension, PlannedDownload, ShowRun};
use super::AcquireError;
use crate::catalog::CatalogEntry;
use crate::parse::{self, EpisodeMarker};
use crate::providers::{InstantLookupProvider, InstantQuery, PackFile, ProviderError, SearchScope};
use crate::retry::retry_async;
use crate::state::{SourceTier, Transition};
use crate::storage::{self, DiskIndex};

impl<'a> ShowRun<'a> {
    /// Acquire one episode and record the result. Only configuration and
    /// state-write errors escape; everything else lands in the state record.
    pub(super) async fn individual(&mut self, entry: &'a CatalogEntry, on_disk: &DiskIndex) -> Result<(), AcquireError> {
        if self.store.is_downloaded(entry) {
            return Ok(());
        }
        if let Some(path) = on_disk.find(entry.season, entry.episode) {
            let path = path.to_path_buf();
            tracing::info!(show = %self.show.id, episode = %entry.key(), file = %path.display(), "already on disk");
            self.store.transition(
                entry,
                Transition::Downloaded {
                    path,
                    source: SourceTier::Disk,
                },
            )?;
            return Ok(());
        }

        self.store.transition(entry, Transition::Searching)?;
        match self.fetch_individual(entry).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => {
                self.store
                    .transition(entry, Transition::Failed { reason: e.to_string() })?;
                Err(e)
            }
            Err(AcquireError::State(e)) => Err(AcquireError::State(e)),
            Err(AcquireError::NotFound(reason)) => {
                tracing::info!(show = %self.show.id, episode = %entry.key(), "not found: {}", reason);
                self.store.transition(entry, Transition::NotFound { reason })?;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(show = %self.show.id, episode = %entry.key(), "acquisition failed: {}", e);
                self.store
                    .transition(entry, Transition::Failed { reason: e.to_string() })?;
                Ok(())
            }
        }
    }

    async fn fetch_individual(&mut self, entry: &'a CatalogEntry) -> Result<(), AcquireError> {
        if let Some(instant) = self.ctx.providers.instant.clone() {
            match self.try_instant(&*instant, entry).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(AcquireError::State(e)) => return Err(AcquireError::State(e)),
                Err(e) => tracing::warn!(
                    show = %self.show.id,
                    episode = %entry.key(),
                    "instant lookup failed, falling back to indexer: {}",
                    e
                ),
            }
        }

        let release = self.show.release_season(entry.season);
        let ranked = self
            .ranked(
                SearchScope::Episode {
                    season: release,
                    episode: entry.episode,
                },
                |c| {
                    c.pack_type.is_none()
                        && parse::parse_episode(&c.candidate.title)
                            .map_or(true, |m| m.season == release && m.covers(entry.episode))
                },
            )
            .await?;
        let Some(best) = ranked.into_iter().next() else {
            return Err(AcquireError::NotFound(format!(
                "no release found for S{:02}E{:02}",
                release, entry.episode
            )));
        };
        tracing::info!(
            show = %self.show.id,
            episode = %entry.key(),
            release = %best.candidate.title,
            score = best.score,
            "individual release chosen"
        );

        let handle = self.commit(&best.candidate.locator).await?;
        let cache = &*self.ctx.providers.cache;
        let files = retry_async(&self.ctx.retry, "cache.files", || cache.files(&handle)).await?;
        let file = pick_episode_file(&files, release, entry.episode)
            .ok_or_else(|| AcquireError::Content(format!("{} holds no video file", handle)))?;
        let ids = [file.id];
        retry_async(&self.ctx.retry, "cache.select", || cache.select(&handle, &ids)).await?;
        let link = self
            .wait_ready(&handle)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AcquireError::Content(format!("{} returned no links", handle)))?;

        let planned = PlannedDownload {
            entries: vec![entry],
            link,
            file_name: file.file_name().to_string(),
        };
        self.download(vec![planned], SourceTier::Individual).await?;
        if !self.store.is_downloaded(entry) {
            // download() already recorded the failure reason
            let reason = self
                .store
                .document()
                .record(&entry.key())
                .and_then(|r| r.error.clone())
                .unwrap_or_else(|| "transfer failed".to_string());
            return Err(AcquireError::Transient(reason));
        }
        Ok(())
    }

    /// Copy the episode from the instant library if it has one.
    async fn try_instant(
        &mut self,
        instant: &dyn InstantLookupProvider,
        entry: &'a CatalogEntry,
    ) -> Result<bool, AcquireError> {
        let query = InstantQuery {
            title: self.show.name.clone(),
            year: self.show.year,
            season: self.show.release_season(entry.season),
            episode: entry.episode,
            runtime_minutes: entry.runtime_minutes,
        };
        let found = match retry_async(&self.ctx.retry, "instant.lookup", || instant.lookup(&query)).await {
            Ok(lookup) => lookup.pick(),
            Err(ProviderError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };
        let Some(file) = found else {
            return Ok(false);
        };

        let name = file.path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let dest = self.layout.episode_path(
            &EpisodeMarker::single(entry.season, entry.episode),
            &entry.title,
            &extension(name),
        );
        let bytes = storage::copy_into_place(&file.path, &dest).await?;
        tracing::info!(
            show = %self.show.id,
            episode = %entry.key(),
            from = %file.path.display(),
            bytes,
            "copied from instant library"
        );
        self.store.transition(
            entry,
            Transition::Downloaded {
                path: dest,
                source: SourceTier::Instant,
            },
        )?;
        Ok(true)
    }
}

/// The file in a single-episode release that holds the episode: a marker
/// match first, otherwise the largest video.
fn pick_episode_file(files: &[PackFile], release_season: u32, episode: u32) -> Option<&PackFile> {
    let videos: Vec<&PackFile> = files
        .iter()
        .filter(|f| f.is_video() && !parse::contains_tag(f.file_name(), "sample"))
        .collect();
    videos
        .iter()
        .copied()
        .find(|f| {
            parse::parse_episode(f.file_name())
                .is_some_and(|m| m.season == release_season && m.covers(episode))
        })
        .or_else(|| videos.iter().copied().max_by_key(|f| f.bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: u64, path: &str, bytes: u64) -> PackFile {
        PackFile {
            id,
            path: path.to_string(),
            bytes,
        }
    }

    #[test]
    fn picks_marker_match_over_size() {
        let files = vec![
            file(1, "Show.S01E03.mkv", 900),
            file(2, "Show.S01E04.mkv", 100),
            file(3, "Show.S01E04.nfo", 1),
        ];
        assert_eq!(pick_episode_file(&files, 1, 4).map(|f| f.id), Some(2));
    }

    #[test]
    fn falls_back_to_largest_video() {
        let files = vec![
            file(1, "a.mkv", 100),
            file(2, "b.mp4", 500),
            file(3, "b.sample.mp4", 900),
        ];
        assert_eq!(pick_episode_file(&files, 1, 4).map(|f| f.id), Some(2));
        assert!(pick_episode_file(&[file(9, "readme.txt", 5)], 1, 1).is_none());
    }
}
