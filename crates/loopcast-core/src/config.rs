use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per provider call (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 2.0 = 2s).
    pub base_delay_secs: f64,
    /// Growth factor applied per attempt.
    pub multiplier: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_secs: 2.0,
            multiplier: 2.0,
            max_delay_secs: 60,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(self.base_delay_secs.max(0.0)),
            multiplier: self.multiplier,
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// Knobs for the tiered acquisition run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Simultaneous file transfers in the download pool.
    pub max_concurrent_transfers: usize,
    /// Pack candidates attempted per tier (top N by score).
    pub pack_attempts: usize,
    /// Series packs are searched only when more than this fraction of the catalog is needed.
    pub series_threshold: f64,
    /// Season packs are searched when at least this fraction of a season is missing.
    pub season_threshold: f64,
    /// Minimum spacing between two "add" calls to the cache provider.
    pub add_spacing_ms: u64,
    /// Interval between readiness polls of a committed pack.
    pub poll_interval_secs: u64,
    /// Upper bound on waiting for the cache provider to finish processing.
    pub ready_timeout_secs: u64,
    /// How long a cached show catalog is trusted before it is fetched again.
    pub catalog_ttl_hours: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_transfers: 3,
            pack_attempts: 3,
            series_threshold: 0.30,
            season_threshold: 0.30,
            add_spacing_ms: 1500,
            poll_interval_secs: 10,
            ready_timeout_secs: 30 * 60,
            catalog_ttl_hours: 24,
        }
    }
}

impl AcquisitionConfig {
    pub fn add_spacing(&self) -> Duration {
        Duration::from_millis(self.add_spacing_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_ttl_hours * 60 * 60)
    }
}

/// Schedule generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seed for the constrained shuffle; equal seeds give equal schedules.
    pub seed: u64,
    /// Block target sizes, cycled (3, 4, 3, 4, ...).
    pub block_sizes: Vec<usize>,
    /// Probed durations above this are treated as corrupt metadata.
    pub max_episode_minutes: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            seed: 20240101,
            block_sizes: vec![3, 4],
            max_episode_minutes: 120,
        }
    }
}

impl ScheduleConfig {
    pub fn max_episode_ms(&self) -> u64 {
        self.max_episode_minutes * 60_000
    }
}

/// External helper programs that implement the provider contracts.
///
/// Each entry is a command line (program followed by fixed arguments).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub metadata: Option<Vec<String>>,
    pub instant: Option<Vec<String>>,
    pub indexer: Option<Vec<String>>,
    pub cache: Option<Vec<String>>,
    /// Environment variable holding the cache provider credential.
    pub cache_token_env: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            metadata: None,
            instant: None,
            indexer: None,
            cache: None,
            cache_token_env: "LOOPCAST_CACHE_TOKEN".to_string(),
        }
    }
}

fn default_duration_minutes() -> u32 {
    22
}

/// One show of the channel lineup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowConfig {
    /// Metadata provider identifier.
    pub id: String,
    /// Display name, also the primary search string.
    pub name: String,
    /// Directory name under `media_root`.
    pub directory: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Release markers worth preferring (e.g. an uncut variant).
    #[serde(default)]
    pub preferred_tags: Vec<String>,
    /// Release season = catalog season + offset.
    #[serde(default)]
    pub season_offset: i32,
    #[serde(default = "default_duration_minutes")]
    pub default_duration_minutes: u32,
    #[serde(default)]
    pub year: Option<u16>,
}

impl ShowConfig {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            directory: name.to_string(),
            aliases: Vec::new(),
            preferred_tags: Vec::new(),
            season_offset: 0,
            default_duration_minutes: default_duration_minutes(),
            year: None,
        }
    }

    /// Season number as it appears in release names.
    pub fn release_season(&self, catalog_season: u32) -> u32 {
        (catalog_season as i64 + self.season_offset as i64).max(0) as u32
    }

    /// Name first, then aliases, without duplicates.
    pub fn search_titles(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        std::iter::once(self.name.as_str())
            .chain(self.aliases.iter().map(String::as_str))
            .filter(|t| !t.trim().is_empty())
            .filter(|t| seen.insert(t.to_lowercase()))
            .collect()
    }

    pub fn default_duration_ms(&self) -> u64 {
        self.default_duration_minutes as u64 * 60_000
    }

    /// True when `query` names this show by id or display name.
    pub fn matches(&self, query: &str) -> bool {
        self.id.eq_ignore_ascii_case(query) || self.name.eq_ignore_ascii_case(query)
    }
}

/// Global configuration loaded from `~/.config/loopcast/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopcastConfig {
    /// Root of the per-show directory tree.
    pub media_root: PathBuf,
    /// Per-show state, catalog cache and schedule. Defaults to the XDG state dir.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    /// Override for the persisted schedule document.
    #[serde(default)]
    pub schedule_path: Option<PathBuf>,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub shows: Vec<ShowConfig>,
}

impl Default for LoopcastConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("media"),
            state_dir: None,
            schedule_path: None,
            acquisition: AcquisitionConfig::default(),
            retry: None,
            schedule: ScheduleConfig::default(),
            providers: ProvidersConfig::default(),
            shows: Vec::new(),
        }
    }
}

impl LoopcastConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().unwrap_or_default().policy()
    }

    pub fn state_dir(&self) -> Result<PathBuf> {
        match &self.state_dir {
            Some(dir) => Ok(dir.clone()),
            None => {
                let xdg_dirs = xdg::BaseDirectories::with_prefix("loopcast")?;
                Ok(xdg_dirs.get_state_home())
            }
        }
    }

    pub fn schedule_path(&self) -> Result<PathBuf> {
        match &self.schedule_path {
            Some(path) => Ok(path.clone()),
            None => Ok(self.state_dir()?.join("schedule.json")),
        }
    }

    pub fn show_dir(&self, show: &ShowConfig) -> PathBuf {
        self.media_root.join(&show.directory)
    }

    pub fn find_show(&self, query: &str) -> Option<&ShowConfig> {
        self.shows.iter().find(|s| s.matches(query))
    }

    /// Shows selected by an optional `--show` filter.
    pub fn select_shows(&self, filter: Option<&str>) -> Result<Vec<&ShowConfig>> {
        match filter {
            None => Ok(self.shows.iter().collect()),
            Some(query) => {
                let show = self
                    .find_show(query)
                    .ok_or_else(|| anyhow::anyhow!("no configured show matches {:?}", query))?;
                Ok(vec![show])
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for show in &self.shows {
            if show.id.trim().is_empty() {
                anyhow::bail!("show {:?} has an empty id", show.name);
            }
            if !ids.insert(show.id.as_str()) {
                anyhow::bail!("duplicate show id {:?}", show.id);
            }
        }
        if self.schedule.block_sizes.is_empty() || self.schedule.block_sizes.contains(&0) {
            anyhow::bail!("schedule.block_sizes must be non-empty and positive");
        }
        if self.acquisition.max_concurrent_transfers == 0 {
            anyhow::bail!("acquisition.max_concurrent_transfers must be at least 1");
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("loopcast")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<LoopcastConfig> {
    let path = config_path()?;
    if !path.exists() {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("loopcast")?;
        let default_cfg = LoopcastConfig {
            media_root: xdg_dirs.get_data_home().join("media"),
            ..LoopcastConfig::default()
        };
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from_path(&path)
}

/// Load configuration from an explicit path (`--config`).
pub fn load_from_path(path: &Path) -> Result<LoopcastConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: LoopcastConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
