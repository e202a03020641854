//! Per-show summaries built from the state document.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::AcquireError;
use crate::catalog::{Catalog, CatalogCache};
use crate::config::ShowConfig;
use crate::state::{EpisodeStatus, SourceTier, StateDocument, StateError, StateStore};

/// An episode that did not make it, with the recorded reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeProblem {
    pub key: String,
    pub title: String,
    pub status: EpisodeStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ShowReport {
    pub show_id: String,
    pub title: String,
    pub total_episodes: usize,
    pub by_status: BTreeMap<EpisodeStatus, usize>,
    /// Catalog entries with no state record yet.
    pub untracked: usize,
    pub by_source: BTreeMap<SourceTier, usize>,
    pub problems: Vec<EpisodeProblem>,
    /// Multi-part groups combined during this run.
    pub combined: usize,
    /// Set when the show's run aborted early.
    pub failure: Option<String>,
}

impl ShowReport {
    pub fn from_state(show_id: &str, catalog: &Catalog, doc: &StateDocument) -> Self {
        let mut report = ShowReport {
            show_id: show_id.to_string(),
            title: doc.title.clone(),
            total_episodes: catalog.len(),
            ..Default::default()
        };
        for entry in &catalog.entries {
            let key = entry.key();
            let Some(record) = doc.record(&key) else {
                report.untracked += 1;
                continue;
            };
            *report.by_status.entry(record.status).or_default() += 1;
            if let Some(source) = record.source.filter(|_| record.status == EpisodeStatus::Downloaded) {
                *report.by_source.entry(source).or_default() += 1;
            }
            if matches!(record.status, EpisodeStatus::Error | EpisodeStatus::NotFound) {
                report.problems.push(EpisodeProblem {
                    key,
                    title: record.title.clone(),
                    status: record.status,
                    reason: record.error.clone(),
                });
            }
        }
        report
    }

    pub fn failed(show: &ShowConfig, err: &AcquireError) -> Self {
        ShowReport {
            show_id: show.id.clone(),
            title: show.name.clone(),
            failure: Some(err.to_string()),
            ..Default::default()
        }
    }

    pub fn count(&self, status: EpisodeStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn downloaded(&self) -> usize {
        self.count(EpisodeStatus::Downloaded)
    }

    pub fn is_complete(&self) -> bool {
        self.total_episodes > 0 && self.downloaded() == self.total_episodes
    }
}

/// Read-only summaries from cached catalogs and state files. Never contacts
/// a provider or writes anything; shows without a cached catalog report
/// whatever their state file holds.
pub fn status_reports(state_dir: &Path, shows: &[&ShowConfig]) -> Result<Vec<ShowReport>, StateError> {
    let cache = CatalogCache::new(state_dir, std::time::Duration::MAX);
    let mut out = Vec::with_capacity(shows.len());
    for show in shows {
        let store = StateStore::open(&StateStore::path_for(state_dir, &show.id))?;
        let catalog = cache.load_any(&show.id).unwrap_or_else(|| {
            Catalog::new(&show.id, &show.name, Vec::new())
        });
        let mut report = ShowReport::from_state(&show.id, &catalog, store.document());
        if catalog.is_empty() {
            // no catalog cached yet; count straight from the state file
            report.total_episodes = store.document().episodes.len();
            for record in store.document().episodes.values() {
                *report.by_status.entry(record.status).or_default() += 1;
            }
        }
        if report.title.is_empty() {
            report.title = show.name.clone();
        }
        out.push(report);
    }
    Ok(out)
}
