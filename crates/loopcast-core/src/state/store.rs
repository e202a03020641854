//! Crash-safe state persistence: temp file + atomic rename, re-verified on load.

use std::path::{Path, PathBuf};

use super::{EpisodeStatus, StateDocument, StateError, Transition};
use crate::catalog::{Catalog, CatalogEntry};
use crate::storage;

/// Owns one show's state document and its file.
///
/// Every mutation goes through [`StateStore::transition`] or
/// [`StateStore::transition_many`] and is on disk before the call returns.
/// Nothing is written when nothing changed, so an idle run leaves the file
/// byte-identical.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    doc: StateDocument,
    dirty: bool,
}

impl StateStore {
    pub fn path_for(state_dir: &Path, show_id: &str) -> PathBuf {
        state_dir.join(format!(
            "{}.state.json",
            storage::sanitize_filename_for_linux(show_id)
        ))
    }

    /// Load (or start) the document and drop every `downloaded` record whose
    /// file is gone, so the episode counts as needed again.
    pub fn open(path: &Path) -> Result<Self, StateError> {
        let doc = storage::read_json_opt::<StateDocument>(path)
            .map_err(|source| StateError::Read {
                path: path.to_path_buf(),
                source,
            })?
            .unwrap_or_default();
        let mut store = Self {
            path: path.to_path_buf(),
            doc,
            dirty: false,
        };
        let demoted = store.verify_downloaded();
        if demoted > 0 {
            tracing::warn!(path = %path.display(), demoted, "downloaded files missing on disk");
        }
        Ok(store)
    }

    fn verify_downloaded(&mut self) -> usize {
        let before = self.doc.episodes.len();
        self.doc.episodes.retain(|key, rec| {
            if rec.status != EpisodeStatus::Downloaded {
                return true;
            }
            let present = rec.file_path.as_deref().map(Path::is_file).unwrap_or(false);
            if !present {
                tracing::info!(episode = %key, "file missing, episode needs acquisition again");
            }
            present
        });
        let demoted = before - self.doc.episodes.len();
        if demoted > 0 {
            self.dirty = true;
        }
        demoted
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &StateDocument {
        &self.doc
    }

    /// Record the catalog's title and size.
    pub fn sync_catalog(&mut self, catalog: &Catalog) {
        if self.doc.title != catalog.title || self.doc.total_episodes != catalog.len() {
            self.doc.title = catalog.title.clone();
            self.doc.total_episodes = catalog.len();
            self.dirty = true;
        }
    }

    /// Forget terminal `error`/`not_found` markers so a full run retries them.
    pub fn clear_terminal(&mut self) -> usize {
        let before = self.doc.episodes.len();
        self.doc
            .episodes
            .retain(|_, r| !matches!(r.status, EpisodeStatus::Error | EpisodeStatus::NotFound));
        let cleared = before - self.doc.episodes.len();
        if cleared > 0 {
            self.dirty = true;
        }
        cleared
    }

    pub fn needed<'a>(&self, catalog: &'a Catalog, keep_not_found: bool) -> Vec<&'a CatalogEntry> {
        self.doc.needed(catalog, keep_not_found)
    }

    pub fn is_downloaded(&self, entry: &CatalogEntry) -> bool {
        self.doc.status(&entry.key()) == Some(EpisodeStatus::Downloaded)
    }

    /// Apply one transition and persist it.
    pub fn transition(&mut self, entry: &CatalogEntry, t: Transition) -> Result<(), StateError> {
        if self.doc.apply(entry, t) {
            self.dirty = true;
        }
        self.flush()
    }

    /// Apply several transitions with a single write.
    pub fn transition_many<'a, I>(&mut self, items: I) -> Result<(), StateError>
    where
        I: IntoIterator<Item = (&'a CatalogEntry, Transition)>,
    {
        for (entry, t) in items {
            if self.doc.apply(entry, t) {
                self.dirty = true;
            }
        }
        self.flush()
    }

    /// Write the document if anything changed since the last write.
    pub fn flush(&mut self) -> Result<(), StateError> {
        if !self.dirty {
            return Ok(());
        }
        storage::write_json_atomic(&self.path, &self.doc).map_err(|source| StateError::Write {
            path: self.path.clone(),
            source,
        })?;
        self.dirty = false;
        Ok(())
    }
}
