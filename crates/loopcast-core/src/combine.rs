//! Multi-part combiner: join the part files of one story into a single file.
//!
//! Parts are concatenated with stream copy. The state is repointed at the
//! combined file before the parts are moved aside into `originals/`, so a
//! crash between the two steps leaves a library the inventory can still read.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::catalog::{Catalog, CatalogCache, CatalogEntry, MultiPart};
use crate::config::{LoopcastConfig, ShowConfig};
use crate::media::{MediaError, MediaRemuxer};
use crate::parse::{self, EpisodeMarker};
use crate::state::{EpisodeStatus, StateError, StateStore, Transition};
use crate::storage::ShowLayout;

#[derive(Debug, Error)]
pub enum CombineError {
    #[error("remux of {output} failed: {source}")]
    Remux {
        output: PathBuf,
        #[source]
        source: MediaError,
    },
    #[error("failed to move {from} aside: {source}")]
    Move {
        from: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    State(#[from] StateError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CombineSummary {
    pub combined: usize,
    pub failed: usize,
    /// Primaries whose parts are not all downloaded yet.
    pub waiting: usize,
}

/// A primary whose parts are all downloaded as separate files.
#[derive(Debug)]
struct Group<'c> {
    primary: &'c CatalogEntry,
    parts: Vec<&'c CatalogEntry>,
    inputs: Vec<PathBuf>,
}

enum Readiness<'c> {
    Ready(Group<'c>),
    Waiting,
    AlreadyCombined,
}

fn readiness<'c>(catalog: &'c Catalog, store: &StateStore, primary: &'c CatalogEntry) -> Readiness<'c> {
    let Some(MultiPart::Primary { episode_numbers, .. }) = &primary.multi_part else {
        return Readiness::AlreadyCombined;
    };
    let mut parts = Vec::with_capacity(episode_numbers.len());
    let mut inputs: Vec<PathBuf> = Vec::new();
    for n in episode_numbers {
        let Some(part) = catalog.get(primary.season, *n) else {
            return Readiness::Waiting;
        };
        let record = store.document().record(&part.key());
        let Some(path) = record
            .filter(|r| r.status == EpisodeStatus::Downloaded)
            .and_then(|r| r.file_path.clone())
        else {
            return Readiness::Waiting;
        };
        parts.push(part);
        if !inputs.contains(&path) {
            inputs.push(path);
        }
    }
    if inputs.len() < 2 {
        return Readiness::AlreadyCombined;
    }
    Readiness::Ready(Group {
        primary,
        parts,
        inputs,
    })
}

fn combined_path(layout: &ShowLayout, group: &Group<'_>) -> PathBuf {
    let first = group.primary;
    let last = group.parts.iter().map(|p| p.episode).max().unwrap_or(first.episode);
    let marker = EpisodeMarker {
        season: first.season,
        episode: first.episode,
        episode_end: (last > first.episode).then_some(last),
    };
    let ext = group.inputs[0]
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mkv")
        .to_ascii_lowercase();
    layout.episode_path(&marker, &parse::strip_part_marker(&first.title), &ext)
}

fn remove_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(file = %path.display(), "removed partial combined output"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(file = %path.display(), "could not remove partial output: {}", e),
    }
}

async fn combine_group(
    store: &mut StateStore,
    layout: &ShowLayout,
    remuxer: &dyn MediaRemuxer,
    group: Group<'_>,
) -> Result<PathBuf, CombineError> {
    let output = combined_path(layout, &group);
    if !group.inputs.contains(&output) {
        // left over from an interrupted attempt
        remove_partial(&output);
    }
    if let Err(source) = remuxer.concat(&group.inputs, &output).await {
        remove_partial(&output);
        return Err(CombineError::Remux { output, source });
    }

    store.transition_many(
        group
            .parts
            .iter()
            .map(|p| (*p, Transition::Relocated { path: output.clone() })),
    )?;

    let originals = layout.originals_dir(group.primary.season);
    fs::create_dir_all(&originals).map_err(|source| CombineError::Move {
        from: originals.clone(),
        source,
    })?;
    for input in &group.inputs {
        let Some(name) = input.file_name() else {
            continue;
        };
        fs::rename(input, originals.join(name)).map_err(|source| CombineError::Move {
            from: input.clone(),
            source,
        })?;
    }
    Ok(output)
}

/// Combine every multi-part story of a show whose parts are all downloaded
/// and still separate. Per-story failures are logged and counted; only a
/// state write failure is returned.
pub async fn combine_show(
    store: &mut StateStore,
    catalog: &Catalog,
    show: &ShowConfig,
    layout: &ShowLayout,
    remuxer: &dyn MediaRemuxer,
) -> Result<CombineSummary, StateError> {
    let mut summary = CombineSummary::default();
    for primary in catalog.entries.iter().filter(|e| e.is_primary()) {
        let group = match readiness(catalog, store, primary) {
            Readiness::Ready(g) => g,
            Readiness::Waiting => {
                summary.waiting += 1;
                continue;
            }
            Readiness::AlreadyCombined => continue,
        };
        let parts = group.inputs.len();
        match combine_group(store, layout, remuxer, group).await {
            Ok(output) => {
                summary.combined += 1;
                tracing::info!(
                    show = %show.id,
                    episode = %primary.key(),
                    parts,
                    file = %output.display(),
                    "multi-part episode combined"
                );
            }
            Err(CombineError::State(e)) => return Err(e),
            Err(e) => {
                summary.failed += 1;
                tracing::warn!(show = %show.id, episode = %primary.key(), "combine failed: {}", e);
            }
        }
    }
    Ok(summary)
}

/// Combine using the cached catalog, without contacting any provider.
/// Returns `None` when the show has never been cataloged.
pub async fn combine_from_cache(
    cfg: &LoopcastConfig,
    state_dir: &Path,
    show: &ShowConfig,
    remuxer: &dyn MediaRemuxer,
) -> Result<Option<CombineSummary>, StateError> {
    let cache = CatalogCache::new(state_dir, cfg.acquisition.catalog_ttl());
    let Some(catalog) = cache.load_any(&show.id) else {
        return Ok(None);
    };
    let mut store = StateStore::open(&StateStore::path_for(state_dir, &show.id))?;
    let layout = ShowLayout::for_show(cfg, show);
    let summary = combine_show(&mut store, &catalog, show, &layout, remuxer).await?;
    store.flush()?;
    Ok(Some(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::entry;
    use crate::state::SourceTier;
    use async_trait::async_trait;

    /// Byte-concatenating stand-in for ffmpeg.
    struct CatRemuxer;

    #[async_trait]
    impl MediaRemuxer for CatRemuxer {
        async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<(), MediaError> {
            let mut data = Vec::new();
            for i in inputs {
                data.extend(fs::read(i)?);
            }
            fs::write(output, data)?;
            Ok(())
        }
    }

    /// Writes half a file, then fails.
    struct BrokenRemuxer;

    #[async_trait]
    impl MediaRemuxer for BrokenRemuxer {
        async fn concat(&self, _inputs: &[PathBuf], output: &Path) -> Result<(), MediaError> {
            fs::write(output, b"partial")?;
            Err(MediaError::Failed {
                tool: "ffmpeg",
                path: output.to_path_buf(),
                stderr: "boom".into(),
            })
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        layout: ShowLayout,
        catalog: Catalog,
        store: StateStore,
        show: ShowConfig,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let show = ShowConfig::new("7", "Harbor Lights");
        let layout = ShowLayout::new(dir.path().join("media"), &show.name);
        let catalog = Catalog::new(
            "7",
            "Harbor Lights",
            vec![
                entry("7", 1, 1, "Pilot"),
                entry("7", 1, 2, "The Deep (Part 1)"),
                entry("7", 1, 3, "The Deep (Part 2)"),
            ],
        );
        let mut store = StateStore::open(&dir.path().join("7.state.json")).unwrap();
        for (i, e) in catalog.entries.iter().enumerate().skip(1) {
            let path = layout.episode_path(&EpisodeMarker::single(1, e.episode), &e.title, "mkv");
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, format!("part{}", i)).unwrap();
            store
                .transition(
                    e,
                    Transition::Downloaded {
                        path,
                        source: SourceTier::Individual,
                    },
                )
                .unwrap();
        }
        Fixture {
            _dir: dir,
            layout,
            catalog,
            store,
            show,
        }
    }

    #[tokio::test]
    async fn combines_and_moves_parts_aside() {
        let mut f = fixture();
        let summary = combine_show(&mut f.store, &f.catalog, &f.show, &f.layout, &CatRemuxer)
            .await
            .unwrap();
        assert_eq!(summary.combined, 1);

        let out = f.layout.season_dir(1).join("Harbor Lights - S01E02-E03 - The Deep.mkv");
        assert_eq!(fs::read_to_string(&out).unwrap(), "part1part2");
        for key in ["7:s01e02", "7:s01e03"] {
            let rec = f.store.document().record(key).unwrap();
            assert_eq!(rec.file_path.as_deref(), Some(out.as_path()));
            assert_eq!(rec.status, EpisodeStatus::Downloaded);
        }
        let originals: Vec<_> = fs::read_dir(f.layout.originals_dir(1)).unwrap().collect();
        assert_eq!(originals.len(), 2);

        // second pass finds nothing left to do
        let again = combine_show(&mut f.store, &f.catalog, &f.show, &f.layout, &CatRemuxer)
            .await
            .unwrap();
        assert_eq!(again, CombineSummary::default());
    }

    #[tokio::test]
    async fn failure_removes_output_and_keeps_parts() {
        let mut f = fixture();
        let before = f.store.document().clone();
        let summary = combine_show(&mut f.store, &f.catalog, &f.show, &f.layout, &BrokenRemuxer)
            .await
            .unwrap();
        assert_eq!(summary.failed, 1);
        let out = f.layout.season_dir(1).join("Harbor Lights - S01E02-E03 - The Deep.mkv");
        assert!(!out.exists());
        assert_eq!(f.store.document(), &before);
        for rec in before.episodes.values() {
            assert!(rec.file_path.as_ref().unwrap().is_file());
        }
    }

    #[tokio::test]
    async fn waits_for_missing_parts() {
        let mut f = fixture();
        let part2 = f.catalog.entries[2].clone();
        f.store
            .transition(&part2, Transition::Failed { reason: "x".into() })
            .unwrap();
        let summary = combine_show(&mut f.store, &f.catalog, &f.show, &f.layout, &CatRemuxer)
            .await
            .unwrap();
        assert_eq!(summary.waiting, 1);
        assert_eq!(summary.combined, 0);
    }
}
