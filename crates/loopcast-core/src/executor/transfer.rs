//! Single-stream HTTP GET transfer into `<dest>.part`, resumed with a byte
//! range when a partial file exists, renamed into place when complete.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::str;
use std::time::Duration;

use crate::retry::{classify_curl_error, classify_http_status, ErrorKind, Retryable};
use crate::storage;

/// Error returned by one transfer attempt (curl failure, HTTP error, or storage failure).
#[derive(Debug)]
pub enum TransferError {
    /// Curl reported an error (timeout, connection, etc.).
    Curl(curl::Error),
    /// HTTP response had a non-2xx status.
    Http(u32),
    /// The server says the file is complete but its length differs from the
    /// part file on disk.
    LengthMismatch { local: u64, remote: Option<u64> },
    /// Disk write failed (disk full, permission denied). Not retried.
    Storage(std::io::Error),
    /// The worker running the transfer died.
    Worker(String),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Curl(e) => write!(f, "{}", e),
            TransferError::Http(code) => write!(f, "HTTP {}", code),
            TransferError::LengthMismatch { local, remote } => match remote {
                Some(remote) => write!(f, "part file holds {} bytes, remote has {}", local, remote),
                None => write!(f, "part file holds {} bytes, remote length unknown", local),
            },
            TransferError::Storage(e) => write!(f, "storage: {}", e),
            TransferError::Worker(msg) => write!(f, "worker: {}", msg),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::Curl(e) => Some(e),
            TransferError::Storage(e) => Some(e),
            TransferError::Http(_) | TransferError::LengthMismatch { .. } | TransferError::Worker(_) => None,
        }
    }
}

impl Retryable for TransferError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            TransferError::Curl(e) => classify_curl_error(e),
            TransferError::Http(code) => classify_http_status(*code),
            // the part file is gone; the next attempt starts clean
            TransferError::LengthMismatch { .. } => ErrorKind::Connection,
            TransferError::Storage(_) | TransferError::Worker(_) => ErrorKind::Other,
        }
    }
}

/// Blocking fetch of one URL to one destination file.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str, destination: &Path) -> Result<u64, TransferError>;
}

#[derive(Debug, Clone, Copy)]
pub struct CurlOptions {
    pub connect_timeout: Duration,
    /// Abort when slower than `low_speed_limit` bytes/s for `low_speed_time`.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    pub timeout: Duration,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            low_speed_limit: 1024,
            low_speed_time: Duration::from_secs(60),
            timeout: Duration::from_secs(4 * 3600),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CurlFetcher {
    opts: CurlOptions,
}

impl CurlFetcher {
    pub fn new(opts: CurlOptions) -> Self {
        Self { opts }
    }
}

/// Appends body bytes to the part file. If we asked for a range but the
/// server answered 200 with the full body, the part file is truncated first.
/// Bodies of non-2xx responses (error pages) are discarded.
struct PartWriter {
    file: File,
    resume_from: u64,
    started: bool,
    error: Option<std::io::Error>,
}

impl PartWriter {
    fn write(&mut self, data: &[u8], status: Option<u32>) -> usize {
        if !status.is_some_and(|code| (200..300).contains(&code)) {
            return data.len();
        }
        if !self.started {
            self.started = true;
            if self.resume_from > 0 && status == Some(200) {
                tracing::debug!("server ignored range, restarting from zero");
                if let Err(e) = self.file.set_len(0) {
                    self.error = Some(e);
                    return 0;
                }
                self.resume_from = 0;
            }
        }
        match self.file.write_all(data) {
            Ok(()) => data.len(),
            Err(e) => {
                self.error = Some(e);
                0 // abort transfer
            }
        }
    }
}

/// Total length from `Content-Range: bytes */1234` (or `bytes 0-9/1234`).
fn total_from_content_range(line: &str) -> Option<u64> {
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-range") {
        return None;
    }
    value.trim().rsplit_once('/')?.1.trim().parse().ok()
}

fn status_from_line(line: &str) -> Option<u32> {
    let mut parts = line.split_whitespace();
    let proto = parts.next()?;
    if !proto.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}

impl Fetcher for CurlFetcher {
    fn fetch(&self, url: &str, destination: &Path) -> Result<u64, TransferError> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(TransferError::Storage)?;
        }
        let part = storage::temp_path(destination);
        let resume_from = fs::metadata(&part).map(|m| m.len()).unwrap_or(0);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&part)
            .map_err(TransferError::Storage)?;

        let mut easy = curl::easy::Easy::new();
        easy.url(url).map_err(TransferError::Curl)?;
        easy.follow_location(true).map_err(TransferError::Curl)?;
        easy.max_redirections(10).map_err(TransferError::Curl)?;
        easy.connect_timeout(self.opts.connect_timeout)
            .map_err(TransferError::Curl)?;
        easy.low_speed_limit(self.opts.low_speed_limit)
            .map_err(TransferError::Curl)?;
        easy.low_speed_time(self.opts.low_speed_time)
            .map_err(TransferError::Curl)?;
        easy.timeout(self.opts.timeout).map_err(TransferError::Curl)?;
        if resume_from > 0 {
            // sent by hand: 200, 416 and error replies are judged below
            tracing::debug!(part = %part.display(), resume_from, "resuming partial file");
            let mut headers = curl::easy::List::new();
            headers
                .append(&format!("Range: bytes={}-", resume_from))
                .map_err(TransferError::Curl)?;
            easy.http_headers(headers).map_err(TransferError::Curl)?;
        }

        let status = Cell::new(None::<u32>);
        let remote_total = Cell::new(None::<u64>);
        let writer = RefCell::new(PartWriter {
            file,
            resume_from,
            started: false,
            error: None,
        });
        let performed = {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|data| {
                    let Ok(line) = str::from_utf8(data) else {
                        return true;
                    };
                    // Last status line wins (redirects produce several).
                    if let Some(code) = status_from_line(line) {
                        status.set(Some(code));
                        remote_total.set(None);
                    } else if let Some(total) = total_from_content_range(line) {
                        remote_total.set(Some(total));
                    }
                    true
                })
                .map_err(TransferError::Curl)?;
            transfer
                .write_function(|data| Ok(writer.borrow_mut().write(data, status.get())))
                .map_err(TransferError::Curl)?;
            transfer.perform()
        };

        let mut writer = writer.into_inner();
        if let Some(e) = writer.error.take() {
            return Err(TransferError::Storage(e));
        }
        performed.map_err(TransferError::Curl)?;

        let code = easy.response_code().map_err(TransferError::Curl)?;
        if code == 416 && resume_from > 0 {
            // Range starts at or past the end. Only a part file of exactly the
            // advertised length is complete; anything else restarts from zero.
            if remote_total.get() != Some(resume_from) {
                tracing::warn!(
                    part = %part.display(),
                    part_len = resume_from,
                    remote_len = ?remote_total.get(),
                    "part file does not match remote length, discarding"
                );
                drop(writer.file);
                fs::remove_file(&part).map_err(TransferError::Storage)?;
                return Err(TransferError::LengthMismatch {
                    local: resume_from,
                    remote: remote_total.get(),
                });
            }
            tracing::debug!(part = %part.display(), "range not satisfiable, part already complete");
        } else if !(200..300).contains(&code) {
            drop(writer.file);
            discard_since(&part, resume_from).map_err(TransferError::Storage)?;
            return Err(TransferError::Http(code));
        }

        writer.file.sync_all().map_err(TransferError::Storage)?;
        drop(writer.file);
        fs::rename(&part, destination).map_err(TransferError::Storage)?;
        let size = fs::metadata(destination).map_err(TransferError::Storage)?.len();
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_lines() {
        assert_eq!(status_from_line("HTTP/1.1 206 Partial Content\r\n"), Some(206));
        assert_eq!(status_from_line("HTTP/2 200\r\n"), Some(200));
        assert_eq!(status_from_line("Content-Length: 5\r\n"), None);
    }

    #[test]
    fn parses_content_range_totals() {
        assert_eq!(total_from_content_range("Content-Range: bytes */8192\r\n"), Some(8192));
        assert_eq!(total_from_content_range("content-range: bytes 0-9/20\r\n"), Some(20));
        assert_eq!(total_from_content_range("Content-Range: bytes 0-9/*\r\n"), None);
        assert_eq!(total_from_content_range("Content-Length: 20\r\n"), None);
    }

    #[test]
    fn error_bodies_never_reach_the_part_file() {
        let dir = tempfile::tempdir().unwrap();
        let part = dir.path().join("ep.mkv.part");
        std::fs::write(&part, b"0123").unwrap();
        let file = OpenOptions::new().append(true).open(&part).unwrap();
        let mut w = PartWriter {
            file,
            resume_from: 4,
            started: false,
            error: None,
        };
        assert_eq!(w.write(b"busy, try later", Some(503)), 15);
        assert_eq!(w.write(b"4567", Some(206)), 4);
        drop(w);
        assert_eq!(std::fs::read(&part).unwrap(), b"01234567");
    }

    #[test]
    fn discard_restores_pre_attempt_length() {
        let dir = tempfile::tempdir().unwrap();
        let part = dir.path().join("ep.mkv.part");
        std::fs::write(&part, b"0123junk").unwrap();
        discard_since(&part, 4).unwrap();
        assert_eq!(std::fs::read(&part).unwrap(), b"0123");
        discard_since(&part, 0).unwrap();
        assert!(!part.exists());
        discard_since(&part, 0).unwrap();
    }

    #[test]
    fn transfer_errors_classify() {
        assert_eq!(TransferError::Http(503).error_kind(), ErrorKind::Throttled);
        assert_eq!(TransferError::Http(404).error_kind(), ErrorKind::Other);
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert_eq!(TransferError::Storage(io).error_kind(), ErrorKind::Other);
    }
}
