//! Catalog cache: one JSON file per show in the state dir, trusted for a TTL
//! so resumed and idempotent runs make no metadata calls.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{build_catalog, Catalog};
use crate::config::ShowConfig;
use crate::providers::{MetadataProvider, ProviderError};
use crate::retry::RetryPolicy;
use crate::storage;

#[derive(Debug, Clone)]
pub struct CatalogCache {
    dir: PathBuf,
    ttl: Duration,
}

impl CatalogCache {
    pub fn new(dir: &Path, ttl: Duration) -> Self {
        Self {
            dir: dir.to_path_buf(),
            ttl,
        }
    }

    pub fn path_for(&self, show_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.catalog.json", storage::sanitize_filename_for_linux(show_id)))
    }

    /// Cached catalog regardless of age. Unreadable caches are treated as absent.
    pub fn load_any(&self, show_id: &str) -> Option<Catalog> {
        let path = self.path_for(show_id);
        match storage::read_json_opt::<Catalog>(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), "ignoring unreadable catalog cache: {}", e);
                None
            }
        }
    }

    /// Cached catalog if younger than the TTL.
    pub fn load_fresh(&self, show_id: &str) -> Option<Catalog> {
        let catalog = self.load_any(show_id)?;
        let age = chrono::Utc::now().timestamp() - catalog.fetched_at;
        (age >= 0 && (age as u64) < self.ttl.as_secs()).then_some(catalog)
    }

    pub fn store(&self, catalog: &Catalog) -> std::io::Result<()> {
        storage::write_json_atomic(&self.path_for(&catalog.show_id), catalog)
    }

    /// Fresh cached catalog, or fetch and cache a new one.
    pub async fn load_or_build(
        &self,
        provider: &dyn MetadataProvider,
        show: &ShowConfig,
        retry: &RetryPolicy,
        refresh: bool,
    ) -> Result<Catalog, ProviderError> {
        if !refresh {
            if let Some(c) = self.load_fresh(&show.id) {
                tracing::debug!(show = %show.id, episodes = c.len(), "using cached catalog");
                return Ok(c);
            }
        }
        let catalog = build_catalog(provider, show, retry).await?;
        if let Err(e) = self.store(&catalog) {
            tracing::warn!(show = %show.id, "failed to cache catalog: {}", e);
        }
        tracing::info!(show = %show.id, episodes = catalog.len(), "catalog built");
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::entry;

    #[test]
    fn fresh_and_stale() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CatalogCache::new(dir.path(), Duration::from_secs(3600));
        let mut c = Catalog::new("42", "Show", vec![entry("42", 1, 1, "a")]);
        cache.store(&c).unwrap();
        assert_eq!(cache.load_fresh("42"), Some(c.clone()));

        c.fetched_at -= 7200;
        cache.store(&c).unwrap();
        assert!(cache.load_fresh("42").is_none());
        assert!(cache.load_any("42").is_some());
        assert!(cache.load_any("missing").is_none());
    }
}
