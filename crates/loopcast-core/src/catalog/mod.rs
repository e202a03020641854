//! Show catalog: the ordered episode list a show is acquired against.

mod cache;
mod multipart;

pub use cache::CatalogCache;
pub use multipart::{detect_multi_part, MAX_PART_LOOKAHEAD};

use serde::{Deserialize, Serialize};

use crate::config::ShowConfig;
use crate::providers::{MetadataProvider, ProviderError};
use crate::retry::{retry_async, RetryPolicy};

/// Multi-part linkage of an episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum MultiPart {
    /// First part; `episode_numbers` lists itself first, then the following parts.
    Primary {
        part_count: u32,
        episode_numbers: Vec<u32>,
    },
    Secondary { primary_episode_number: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub show_id: String,
    pub season: u32,
    pub episode: u32,
    pub title: String,
    #[serde(default)]
    pub synopsis: String,
    #[serde(default)]
    pub runtime_minutes: Option<u32>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub air_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_part: Option<MultiPart>,
}

impl CatalogEntry {
    /// Key into the per-show state document.
    pub fn key(&self) -> String {
        crate::state::episode_key(&self.show_id, self.season, self.episode)
    }

    pub fn is_primary(&self) -> bool {
        matches!(self.multi_part, Some(MultiPart::Primary { .. }))
    }
}

/// Every known episode of a show, sorted by (season, episode).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub show_id: String,
    pub title: String,
    /// Unix seconds at which the metadata was fetched.
    pub fetched_at: i64,
    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(show_id: &str, title: &str, mut entries: Vec<CatalogEntry>) -> Self {
        entries.sort_by_key(|e| (e.season, e.episode));
        entries.dedup_by_key(|e| (e.season, e.episode));
        detect_multi_part(&mut entries);
        Self {
            show_id: show_id.to_string(),
            title: title.to_string(),
            fetched_at: chrono::Utc::now().timestamp(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, season: u32, episode: u32) -> Option<&CatalogEntry> {
        self.entries
            .binary_search_by_key(&(season, episode), |e| (e.season, e.episode))
            .ok()
            .map(|i| &self.entries[i])
    }

    pub fn seasons(&self) -> Vec<u32> {
        let mut seasons: Vec<u32> = self.entries.iter().map(|e| e.season).collect();
        seasons.dedup();
        seasons
    }

    pub fn season_entries(&self, season: u32) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter().filter(move |e| e.season == season)
    }

    /// Resolve a release-side season/episode to a catalog entry. Catalog seasons
    /// whose offset-mapped number equals `release_season` are tried in order
    /// until one contains the episode.
    pub fn resolve_release(
        &self,
        show: &ShowConfig,
        release_season: u32,
        episode: u32,
    ) -> Option<&CatalogEntry> {
        self.seasons()
            .into_iter()
            .filter(|s| show.release_season(*s) == release_season)
            .find_map(|s| self.get(s, episode))
    }
}

/// Fetch every season of a show from the metadata provider. Specials
/// (season 0) are not part of the broadcast loop and are skipped.
pub async fn build_catalog(
    provider: &dyn MetadataProvider,
    show: &ShowConfig,
    retry: &RetryPolicy,
) -> Result<Catalog, ProviderError> {
    let info = retry_async(retry, "metadata.series", || provider.series(&show.id)).await?;
    let mut entries = Vec::new();
    for season in info.seasons.iter().copied().filter(|s| *s > 0) {
        let episodes =
            retry_async(retry, "metadata.season", || provider.season(&show.id, season)).await?;
        tracing::debug!(show = %show.id, season, episodes = episodes.len(), "fetched season");
        entries.extend(episodes.into_iter().map(|ep| CatalogEntry {
            show_id: show.id.clone(),
            season,
            episode: ep.number,
            title: ep.title,
            synopsis: ep.synopsis,
            runtime_minutes: ep.runtime_minutes,
            thumbnail: ep.thumbnail,
            air_date: ep.air_date,
            multi_part: None,
        }));
    }
    let title = if info.title.trim().is_empty() {
        show.name.clone()
    } else {
        info.title
    };
    Ok(Catalog::new(&show.id, &title, entries))
}

#[cfg(test)]
pub(crate) fn entry(show_id: &str, season: u32, episode: u32, title: &str) -> CatalogEntry {
    CatalogEntry {
        show_id: show_id.to_string(),
        season,
        episode,
        title: title.to_string(),
        synopsis: String::new(),
        runtime_minutes: Some(22),
        thumbnail: None,
        air_date: None,
        multi_part: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_sorts_and_looks_up() {
        let c = Catalog::new(
            "s",
            "Show",
            vec![entry("s", 2, 1, "b"), entry("s", 1, 2, "a2"), entry("s", 1, 1, "a1")],
        );
        assert_eq!(c.seasons(), vec![1, 2]);
        assert_eq!(c.get(1, 2).unwrap().title, "a2");
        assert!(c.get(3, 1).is_none());
        assert_eq!(c.season_entries(1).count(), 2);
    }

    #[test]
    fn resolves_release_with_offset() {
        let mut show = ShowConfig::new("s", "Show");
        show.season_offset = 1;
        let c = Catalog::new("s", "Show", vec![entry("s", 1, 1, "a"), entry("s", 2, 1, "b")]);
        assert_eq!(c.resolve_release(&show, 2, 1).unwrap().title, "a");
        assert_eq!(c.resolve_release(&show, 3, 1).unwrap().title, "b");
        assert!(c.resolve_release(&show, 1, 1).is_none());
    }

    #[test]
    fn multi_part_json_shape() {
        let primary = MultiPart::Primary {
            part_count: 2,
            episode_numbers: vec![5, 6],
        };
        let json = serde_json::to_value(&primary).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"role": "primary", "partCount": 2, "episodeNumbers": [5, 6]})
        );
        let secondary: MultiPart =
            serde_json::from_str(r#"{"role":"secondary","primaryEpisodeNumber":5}"#).unwrap();
        assert_eq!(
            secondary,
            MultiPart::Secondary {
                primary_episode_number: 5
            }
        );
    }
}
