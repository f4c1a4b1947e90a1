use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Result, VideoError};

/// Brings a source video to a local path
#[async_trait]
pub trait VideoFetcher: Send + Sync {
    async fn fetch(&self, source: &str, destination: &Path) -> Result<()>;
}

/// Protocols ffmpeg may open while reading a source, nested ones included
pub const PROTOCOL_WHITELIST: &str = "http,https,tcp,tls,crypto";

/// Fetches through ffmpeg, restricted to network protocols
#[derive(Debug, Clone)]
pub struct FfmpegFetcher {
    ffmpeg: PathBuf,
}

impl FfmpegFetcher {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self { ffmpeg: ffmpeg.into() }
    }

    fn command(&self, source: &str, destination: &Path) -> Command {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-nostdin", "-y", "-v", "error"])
            .args(["-protocol_whitelist", PROTOCOL_WHITELIST])
            .args(["-i", source])
            .arg(destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl VideoFetcher for FfmpegFetcher {
    async fn fetch(&self, source: &str, destination: &Path) -> Result<()> {
        info!("⬇️  Fetching {} into {}", source, destination.display());

        let output = self
            .command(source, destination)
            .output()
            .await
            .map_err(|e| VideoError::FetchFailed {
                source_url: source.to_string(),
                reason: format!("failed to run {}: {}", self.ffmpeg.display(), e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VideoError::FetchFailed {
                source_url: source.to_string(),
                reason: stderr.trim().to_string(),
            }
            .into());
        }

        if !tokio::fs::try_exists(destination).await.unwrap_or(false) {
            return Err(VideoError::FetchFailed {
                source_url: source.to_string(),
                reason: "nothing was written".to_string(),
            }
            .into());
        }

        debug!("Fetched {}", source);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_input_is_limited_to_network_protocols() {
        let fetcher = FfmpegFetcher::new("ffmpeg");
        let cmd = fetcher.command("https://example.com/clip.mp4", Path::new("/tmp/temp_00000000.mp4"));
        let args: Vec<String> = cmd.as_std().get_args().map(|a| a.to_string_lossy().into_owned()).collect();

        let whitelist = args.iter().position(|a| a == "-protocol_whitelist").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[whitelist + 1], PROTOCOL_WHITELIST);
        assert!(!PROTOCOL_WHITELIST.split(',').any(|p| p == "file"));
        assert!(whitelist < input);
        assert_eq!(args[input + 1], "https://example.com/clip.mp4");
        assert_eq!(args.last().map(String::as_str), Some("/tmp/temp_00000000.mp4"));
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_is_fetch_failure() {
        let dir = tempdir().unwrap();
        let fetcher = FfmpegFetcher::new("/nonexistent/ffmpeg");
        let err = fetcher
            .fetch("https://example.com/clip.mp4", &dir.path().join("temp_00000000.mp4"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("https://example.com/clip.mp4"));
    }
}
