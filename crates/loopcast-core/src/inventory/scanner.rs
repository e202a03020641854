//! Walk show directories and measure every selected file.

use std::io;
use std::path::Path;

use super::{describe, select_files, InventoryEntry};
use crate::catalog::{Catalog, CatalogCache};
use crate::config::{LoopcastConfig, ShowConfig};
use crate::media::MediaProbe;
use crate::state::{StateDocument, StateStore};
use crate::storage::{self, ShowLayout};

/// Replace absent or implausible durations with the show's estimate.
pub fn clamp_duration(probed: Option<u64>, max_ms: u64, default_ms: u64) -> u64 {
    match probed {
        Some(ms) if ms > 0 && ms <= max_ms => ms,
        _ => default_ms,
    }
}

pub struct InventoryScanner<'p> {
    probe: &'p dyn MediaProbe,
    max_episode_ms: u64,
}

impl<'p> InventoryScanner<'p> {
    pub fn new(probe: &'p dyn MediaProbe, max_episode_ms: u64) -> Self {
        Self {
            probe,
            max_episode_ms,
        }
    }

    /// Probed duration of one file, clamped.
    pub async fn duration_ms(&self, show: &ShowConfig, path: &Path) -> u64 {
        let default_ms = show.default_duration_ms();
        let probed = match self.probe.probe(path).await {
            Ok(report) => report.duration_ms(),
            Err(e) => {
                tracing::warn!(show = %show.id, file = %path.display(), "probe failed, using estimate: {}", e);
                return default_ms;
            }
        };
        match probed {
            Some(ms) if ms > self.max_episode_ms => {
                tracing::warn!(
                    show = %show.id,
                    file = %path.display(),
                    probed_ms = ms,
                    default_ms,
                    "implausible duration, using estimate"
                );
            }
            None => {
                tracing::debug!(show = %show.id, file = %path.display(), "no duration metadata, using estimate");
            }
            _ => {}
        }
        clamp_duration(probed, self.max_episode_ms, default_ms)
    }

    /// Inventory of one show's directory, ordered by (season, episode).
    pub async fn scan_show(
        &self,
        show: &ShowConfig,
        layout: &ShowLayout,
        catalog: Option<&Catalog>,
        state: Option<&StateDocument>,
    ) -> io::Result<Vec<InventoryEntry>> {
        let files = layout.video_files()?;
        let mut out = Vec::new();
        for (file, variant) in select_files(show, files) {
            let mut entry = describe(show, file, variant, catalog, state);
            entry.duration_ms = self.duration_ms(show, &entry.file_path).await;
            out.push(entry);
        }
        tracing::info!(show = %show.id, files = out.len(), "inventory scanned");
        Ok(out)
    }

    /// Inventory of every configured show, using cached catalogs and state
    /// files for metadata. Shows with nothing on disk contribute nothing.
    pub async fn scan_all(&self, cfg: &LoopcastConfig, state_dir: &Path) -> io::Result<Vec<InventoryEntry>> {
        let cache = CatalogCache::new(state_dir, cfg.acquisition.catalog_ttl());
        let mut out = Vec::new();
        for show in &cfg.shows {
            let catalog = cache.load_any(&show.id);
            let state: Option<StateDocument> =
                storage::read_json_opt(&StateStore::path_for(state_dir, &show.id))?;
            let layout = ShowLayout::for_show(cfg, show);
            out.extend(
                self.scan_show(show, &layout, catalog.as_ref(), state.as_ref())
                    .await?,
            );
        }
        Ok(out)
    }
}
