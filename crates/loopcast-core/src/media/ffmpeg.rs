use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{MediaError, MediaRemuxer};

/// Concatenates parts with ffmpeg's concat demuxer and stream copy (no re-encode).
#[derive(Debug, Clone)]
pub struct FfmpegRemuxer {
    program: String,
}

impl Default for FfmpegRemuxer {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
        }
    }
}

impl FfmpegRemuxer {
    pub fn with_program(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

/// Concat demuxer list entry; single quotes are escaped as `'\''`.
fn list_line(path: &Path) -> String {
    let escaped = path.to_string_lossy().replace('\'', r"'\''");
    format!("file '{}'\n", escaped)
}

#[async_trait]
impl MediaRemuxer for FfmpegRemuxer {
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<(), MediaError> {
        let mut list = tempfile::Builder::new()
            .prefix("loopcast-concat")
            .suffix(".txt")
            .tempfile()?;
        for input in inputs {
            list.write_all(list_line(input).as_bytes())?;
        }
        list.flush()?;

        let out = Command::new(&self.program)
            .args(["-hide_banner", "-loglevel", "error", "-y", "-f", "concat", "-safe", "0", "-i"])
            .arg(list.path())
            .args(["-map", "0", "-c", "copy"])
            .arg(output)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                tool: "ffmpeg",
                source,
            })?;
        if !out.status.success() {
            return Err(MediaError::Failed {
                tool: "ffmpeg",
                path: output.to_path_buf(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_lines_escape_quotes() {
        assert_eq!(
            list_line(Path::new("/m/It's Here.mkv")),
            "file '/m/It'\\''s Here.mkv'\n"
        );
    }
}
