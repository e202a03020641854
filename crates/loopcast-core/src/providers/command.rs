//! Provider backed by an external helper program.
//!
//! The helper is invoked as `<program> [args...] <operation>` with a JSON
//! request on stdin and must print a JSON response on stdout. Exit status
//! 0 is success, 66 means "not found", 75 means "temporary failure, retry"
//! (rate limited when stderr says "rate limit"); anything else is a content
//! error carrying stderr.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{
    CacheProvider, CacheStatus, EpisodeMetadata, IndexerProvider, InstantLookup,
    InstantLookupProvider, InstantQuery, MetadataProvider, PackFile, PackHandle, ProviderError,
    Providers, SearchQuery, SeriesInfo, SourceCandidate,
};
use crate::config::ProvidersConfig;

const EXIT_NOT_FOUND: i32 = 66;
const EXIT_TEMPFAIL: i32 = 75;

#[derive(Debug, Clone)]
pub struct CommandProvider {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl CommandProvider {
    /// Build from a config command line (program followed by fixed args).
    pub fn from_command_line(line: &[String]) -> Result<Self, ProviderError> {
        let (program, args) = line
            .split_first()
            .ok_or_else(|| ProviderError::Configuration("empty provider command".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            envs: Vec::new(),
        })
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.to_string(), value.to_string()));
        self
    }

    async fn invoke<Req, Resp>(&self, operation: &str, request: &Req) -> Result<Resp, ProviderError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request)
            .map_err(|e| ProviderError::Protocol(format!("encode {} request: {}", operation, e)))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(operation)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ProviderError::Configuration(format!("failed to spawn {}: {}", self.program, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(&payload).await {
                Ok(()) => {}
                // Helper exited without reading its request; its exit status decides.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(e) => {
                    return Err(ProviderError::Transient(format!(
                        "write to {} stdin: {}",
                        self.program, e
                    )))
                }
            }
        }

        let output = child.wait_with_output().await.map_err(|e| {
            ProviderError::Transient(format!("read {} output: {}", self.program, e))
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        match output.status.code() {
            Some(0) => {}
            Some(EXIT_NOT_FOUND) => return Err(ProviderError::NotFound(stderr)),
            Some(EXIT_TEMPFAIL) if stderr.to_ascii_lowercase().contains("rate limit") => {
                return Err(ProviderError::RateLimited(stderr))
            }
            Some(EXIT_TEMPFAIL) => return Err(ProviderError::Transient(stderr)),
            code => {
                return Err(ProviderError::Content(format!(
                    "{} {} exited with {:?}: {}",
                    self.program, operation, code, stderr
                )))
            }
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            ProviderError::Protocol(format!("{} {} returned invalid JSON: {}", self.program, operation, e))
        })
    }
}

#[derive(Deserialize)]
struct AddResponse {
    handle: PackHandle,
}

#[derive(Deserialize)]
struct ResolveResponse {
    url: String,
}

#[async_trait]
impl MetadataProvider for CommandProvider {
    async fn series(&self, show_id: &str) -> Result<SeriesInfo, ProviderError> {
        self.invoke("series", &json!({ "showId": show_id })).await
    }

    async fn season(&self, show_id: &str, season: u32) -> Result<Vec<EpisodeMetadata>, ProviderError> {
        self.invoke("season", &json!({ "showId": show_id, "season": season }))
            .await
    }
}

#[async_trait]
impl InstantLookupProvider for CommandProvider {
    async fn lookup(&self, query: &InstantQuery) -> Result<InstantLookup, ProviderError> {
        self.invoke("lookup", query).await
    }
}

#[async_trait]
impl IndexerProvider for CommandProvider {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SourceCandidate>, ProviderError> {
        self.invoke("search", query).await
    }
}

#[async_trait]
impl CacheProvider for CommandProvider {
    async fn add(&self, locator: &str) -> Result<PackHandle, ProviderError> {
        let resp: AddResponse = self.invoke("add", &json!({ "locator": locator })).await?;
        Ok(resp.handle)
    }

    async fn files(&self, handle: &PackHandle) -> Result<Vec<PackFile>, ProviderError> {
        self.invoke("files", &json!({ "handle": handle })).await
    }

    async fn select(&self, handle: &PackHandle, file_ids: &[u64]) -> Result<(), ProviderError> {
        let _: serde_json::Value = self
            .invoke("select", &json!({ "handle": handle, "fileIds": file_ids }))
            .await?;
        Ok(())
    }

    async fn status(&self, handle: &PackHandle) -> Result<CacheStatus, ProviderError> {
        self.invoke("status", &json!({ "handle": handle })).await
    }

    async fn resolve(&self, link: &str) -> Result<String, ProviderError> {
        let resp: ResolveResponse = self.invoke("resolve", &json!({ "link": link })).await?;
        Ok(resp.url)
    }
}

fn required(line: &Option<Vec<String>>, name: &str) -> Result<CommandProvider, ProviderError> {
    match line {
        Some(line) => CommandProvider::from_command_line(line),
        None => Err(ProviderError::Configuration(format!(
            "providers.{} is not configured",
            name
        ))),
    }
}

impl Providers {
    /// Build the provider set from `[providers]`. The cache credential must be
    /// present in the environment; it is forwarded to the cache helper only.
    pub fn from_config(cfg: &ProvidersConfig) -> Result<Self, ProviderError> {
        let metadata = required(&cfg.metadata, "metadata")?;
        let indexer = required(&cfg.indexer, "indexer")?;
        let token = std::env::var(&cfg.cache_token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::Configuration(format!(
                    "cache provider credential missing: set {}",
                    cfg.cache_token_env
                ))
            })?;
        let cache = required(&cfg.cache, "cache")?.with_env(&cfg.cache_token_env, &token);
        let instant = match &cfg.instant {
            Some(line) => Some(Arc::new(CommandProvider::from_command_line(line)?)
                as Arc<dyn InstantLookupProvider>),
            None => None,
        };
        Ok(Providers {
            metadata: Arc::new(metadata),
            instant,
            indexer: Arc::new(indexer),
            cache: Arc::new(cache),
        })
    }
}
