//! Pack handling: map a pack's file list onto catalog entries, then fetch.

use std::collections::HashSet;

use super::show::{PlannedDownload, ShowRun};
use super::AcquireError;
use crate::catalog::{Catalog, CatalogEntry};
use crate::config::ShowConfig;
use crate::parse;
use crate::providers::{PackFile, SourceCandidate};
use crate::retry::retry_async;
use crate::state::SourceTier;

/// A pack file and the catalog entries it contains.
#[derive(Debug, Clone)]
pub struct MappedFile<'c> {
    pub file: PackFile,
    pub entries: Vec<&'c CatalogEntry>,
}

fn is_sample(file: &PackFile) -> bool {
    parse::contains_tag(file.file_name(), "sample")
}

/// Map pack files to catalog entries.
///
/// Non-video and sample files are dropped; the rest are ordered by file id.
/// Each file's episode marker (with any `Season N` folder as a season hint)
/// is resolved through the show's season offset. An episode already claimed
/// by an earlier file is not claimed again.
pub fn map_pack_files<'c>(files: &[PackFile], catalog: &'c Catalog, show: &ShowConfig) -> Vec<MappedFile<'c>> {
    let mut videos: Vec<&PackFile> = files.iter().filter(|f| f.is_video() && !is_sample(f)).collect();
    videos.sort_by_key(|f| f.id);

    let mut claimed = HashSet::new();
    let mut mapped = Vec::new();
    for file in videos {
        let Some(marker) = parse::parse_episode_with_season(file.file_name(), file.folder_season()) else {
            tracing::debug!(file = %file.path, "no episode marker, skipping");
            continue;
        };
        let entries: Vec<&CatalogEntry> = marker
            .episodes()
            .filter_map(|ep| catalog.resolve_release(show, marker.season, ep))
            .filter(|e| claimed.insert(e.key()))
            .collect();
        if entries.is_empty() {
            tracing::debug!(file = %file.path, "no catalog match, skipping");
            continue;
        }
        tracing::debug!(
            file = %file.path,
            release_season = marker.season,
            catalog_season = entries[0].season,
            episode = entries[0].episode,
            "pack file mapped"
        );
        mapped.push(MappedFile {
            file: file.clone(),
            entries,
        });
    }
    mapped
}

impl<'a> ShowRun<'a> {
    /// Commit a pack, select the files covering needed episodes and fetch them.
    /// Returns the number of needed episodes the pack mapped.
    pub(super) async fn attempt_pack(
        &mut self,
        candidate: &SourceCandidate,
        tier: SourceTier,
    ) -> Result<usize, AcquireError> {
        let handle = self.commit(&candidate.locator).await?;
        let cache = &*self.ctx.providers.cache;
        let files = retry_async(&self.ctx.retry, "cache.files", || cache.files(&handle)).await?;

        let needed: HashSet<String> = self.needed().iter().map(|e| e.key()).collect();
        let wanted: Vec<MappedFile<'a>> = map_pack_files(&files, self.catalog, self.show)
            .into_iter()
            .filter_map(|mut m| {
                m.entries.retain(|e| needed.contains(&e.key()));
                (!m.entries.is_empty()).then_some(m)
            })
            .collect();
        let mapped: usize = wanted.iter().map(|m| m.entries.len()).sum();
        tracing::debug!(
            show = %self.show.id,
            %handle,
            files = files.len(),
            usable = wanted.len(),
            mapped,
            "pack file list mapped"
        );
        if wanted.is_empty() {
            return Ok(0);
        }

        let ids: Vec<u64> = wanted.iter().map(|m| m.file.id).collect();
        retry_async(&self.ctx.retry, "cache.select", || cache.select(&handle, &ids)).await?;
        let links = self.wait_ready(&handle).await?;
        // links pair with selected files by position; a short or long list
        // cannot be paired safely
        if links.len() != wanted.len() {
            return Err(AcquireError::Content(format!(
                "{} returned {} links for {} selected files",
                handle,
                links.len(),
                wanted.len()
            )));
        }

        let planned: Vec<PlannedDownload<'a>> = wanted
            .into_iter()
            .zip(links)
            .map(|(m, link)| PlannedDownload {
                file_name: m.file.file_name().to_string(),
                entries: m.entries,
                link,
            })
            .collect();
        let downloaded = self.download(planned, tier).await?;
        tracing::info!(show = %self.show.id, %handle, mapped, downloaded, "pack processed");
        Ok(mapped)
    }
}
