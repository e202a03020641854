//! Tiered acquisition: series pack, then season packs, then individual episodes.
//!
//! Each show is processed independently: catalog, state, needed set, tiers,
//! then the multi-part combiner. Per-episode and per-candidate failures are
//! recorded in state and logged; only configuration errors abort the run.

mod individual;
mod pack;
mod report;
mod show;

pub use pack::{map_pack_files, MappedFile};
pub use report::{status_reports, EpisodeProblem, ShowReport};

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::catalog::CatalogCache;
use crate::combine;
use crate::config::{LoopcastConfig, ShowConfig};
use crate::executor::{ActiveTransfers, DownloadExecutor, SubmissionThrottle, TransferError};
use crate::media::MediaRemuxer;
use crate::providers::{ProviderError, Providers};
use crate::retry::{ErrorKind, RetryPolicy, Retryable};
use crate::state::{StateError, StateStore};
use crate::storage::ShowLayout;

use show::ShowRun;

#[derive(Debug, Error)]
pub enum AcquireError {
    /// No source exists anywhere; terminal, not retried automatically.
    #[error("not found: {0}")]
    NotFound(String),
    /// Timeouts, rate limiting, 5xx after retries were exhausted.
    #[error("transient provider error: {0}")]
    Transient(String),
    /// Dead or invalid source, or nothing usable inside a pack.
    #[error("content error: {0}")]
    Content(String),
    /// Missing credentials or providers; aborts the whole run.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AcquireError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, AcquireError::Configuration(_))
    }
}

impl From<ProviderError> for AcquireError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Transient(m) | ProviderError::RateLimited(m) => AcquireError::Transient(m),
            ProviderError::NotFound(m) => AcquireError::NotFound(m),
            ProviderError::Content(m) | ProviderError::Protocol(m) => AcquireError::Content(m),
            ProviderError::Configuration(m) => AcquireError::Configuration(m),
        }
    }
}

impl From<TransferError> for AcquireError {
    fn from(e: TransferError) -> Self {
        match e.error_kind() {
            ErrorKind::Other => AcquireError::Content(format!("transfer failed: {}", e)),
            _ => AcquireError::Transient(format!("transfer failed: {}", e)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Retry everything not downloaded, including `error` and `not_found`.
    #[default]
    Full,
    /// Keep `not_found` terminal; retry errors, in-flight and missing episodes.
    Resume,
}

#[derive(Debug, Clone, Default)]
pub struct AcquireOptions {
    pub mode: RunMode,
    /// Restrict the run to one show (id or name).
    pub show: Option<String>,
    /// Ignore the cached catalog and fetch metadata again.
    pub refresh_catalog: bool,
}

/// Drives acquisition for the configured shows.
pub struct Acquirer {
    cfg: LoopcastConfig,
    state_dir: PathBuf,
    providers: Providers,
    executor: DownloadExecutor,
    throttle: Arc<SubmissionThrottle>,
    remuxer: Arc<dyn MediaRemuxer>,
    retry: RetryPolicy,
}

impl Acquirer {
    pub fn new(
        cfg: LoopcastConfig,
        state_dir: PathBuf,
        providers: Providers,
        remuxer: Arc<dyn MediaRemuxer>,
    ) -> Self {
        let retry = cfg.retry_policy();
        let executor = DownloadExecutor::new(cfg.acquisition.max_concurrent_transfers, retry);
        let throttle = Arc::new(SubmissionThrottle::new(cfg.acquisition.add_spacing()));
        Self {
            cfg,
            state_dir,
            providers,
            executor,
            throttle,
            remuxer,
            retry,
        }
    }

    /// Replace the download pool (tests inject fetchers here).
    pub fn with_executor(mut self, executor: DownloadExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn config(&self) -> &LoopcastConfig {
        &self.cfg
    }

    pub async fn run(&self, opts: &AcquireOptions) -> Result<Vec<ShowReport>, AcquireError> {
        let shows: Vec<&ShowConfig> = match &opts.show {
            Some(q) => vec![self.cfg.find_show(q).ok_or_else(|| {
                AcquireError::Configuration(format!("no configured show matches {:?}", q))
            })?],
            None => self.cfg.shows.iter().collect(),
        };
        if shows.is_empty() {
            return Err(AcquireError::Configuration("no shows configured".to_string()));
        }

        let mut reports = Vec::with_capacity(shows.len());
        for show in shows {
            match self.run_show(show, opts).await {
                Ok(report) => reports.push(report),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::error!(show = %show.id, "acquisition failed: {}", e);
                    reports.push(ShowReport::failed(show, &e));
                }
            }
        }
        Ok(reports)
    }

    pub async fn run_show(&self, show: &ShowConfig, opts: &AcquireOptions) -> Result<ShowReport, AcquireError> {
        tracing::info!(show = %show.id, mode = ?opts.mode, "acquisition started");
        let cache = CatalogCache::new(&self.state_dir, self.cfg.acquisition.catalog_ttl());
        let catalog = cache
            .load_or_build(&*self.providers.metadata, show, &self.retry, opts.refresh_catalog)
            .await?;
        if catalog.is_empty() {
            return Err(AcquireError::NotFound(format!("no episodes listed for {}", show.name)));
        }

        let mut store = StateStore::open(&StateStore::path_for(&self.state_dir, &show.id))?;
        store.sync_catalog(&catalog);
        if opts.mode == RunMode::Full {
            let cleared = store.clear_terminal();
            if cleared > 0 {
                tracing::info!(show = %show.id, cleared, "retrying episodes previously marked error/not_found");
            }
        }
        store.flush()?;

        let layout = ShowLayout::for_show(&self.cfg, show);
        let mut run = ShowRun {
            ctx: self,
            show,
            catalog: &catalog,
            layout,
            store,
            active: ActiveTransfers::default(),
            keep_not_found: opts.mode == RunMode::Resume,
        };
        run.execute().await?;

        let combined =
            combine::combine_show(&mut run.store, &catalog, show, &run.layout, &*self.remuxer).await?;
        let mut report = ShowReport::from_state(&show.id, &catalog, run.store.document());
        report.combined = combined.combined;
        tracing::info!(
            show = %show.id,
            downloaded = report.downloaded(),
            total = report.total_episodes,
            "acquisition finished"
        );
        Ok(report)
    }
}
