//! External media tools: duration probing and lossless concatenation.

mod ffmpeg;
mod ffprobe;

pub use ffmpeg::FfmpegRemuxer;
pub use ffprobe::FfprobeProbe;

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} failed on {path}: {stderr}")]
    Failed {
        tool: &'static str,
        path: PathBuf,
        stderr: String,
    },
    #[error("unreadable ffprobe output: {0}")]
    Output(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeStream {
    #[serde(default)]
    pub codec_type: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeFormat {
    #[serde(default)]
    pub duration: Option<String>,
}

/// Subset of `ffprobe -print_format json -show_streams -show_format`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeReport {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    #[serde(default)]
    pub format: ProbeFormat,
}

impl ProbeReport {
    /// Duration in milliseconds. The video stream's own duration (or its
    /// `DURATION` tag, as written by Matroska muxers) wins over the container
    /// value, which is unreliable on badly muxed files.
    pub fn duration_ms(&self) -> Option<u64> {
        let video = self
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"));
        let from_stream = video.and_then(|v| {
            v.duration
                .as_deref()
                .and_then(parse_duration_ms)
                .or_else(|| {
                    v.tags
                        .iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case("duration"))
                        .and_then(|(_, val)| parse_duration_ms(val))
                })
        });
        from_stream.or_else(|| self.format.duration.as_deref().and_then(parse_duration_ms))
    }
}

/// Parse ffprobe durations: plain seconds ("1332.456") or "HH:MM:SS.fraction".
pub fn parse_duration_ms(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "N/A" {
        return None;
    }
    let secs: f64 = if raw.contains(':') {
        let mut total = 0.0;
        for part in raw.split(':') {
            total = total * 60.0 + part.parse::<f64>().ok()?;
        }
        total
    } else {
        raw.parse().ok()?
    };
    if !secs.is_finite() || secs <= 0.0 {
        return None;
    }
    Some((secs * 1000.0).round() as u64)
}

/// Media inspection utility.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<ProbeReport, MediaError>;
}

/// Media remux utility: lossless concatenation of parts into one container.
#[async_trait]
pub trait MediaRemuxer: Send + Sync {
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<(), MediaError>;
}
