use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::{DownloadKind, MediaDownloader};
use crate::Result;

/// Some YouTube player clients answer plain requests with 403; these do not
const PLAYER_CLIENTS: &str = "youtube:player_client=android,ios";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const VIDEO_FORMAT: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";
const AUDIO_FORMAT: &str = "bestaudio/best";
const AUDIO_QUALITY: &str = "192K";

/// YouTube downloader using yt-dlp
pub struct YtDlpDownloader {
    yt_dlp_path: String,
}

impl YtDlpDownloader {
    pub fn new(yt_dlp_path: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
        }
    }

    /// Check if yt-dlp is available
    pub async fn is_available(&self) -> bool {
        Command::new(&self.yt_dlp_path)
            .arg("--version")
            .kill_on_drop(true)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn common_args() -> Vec<&'static str> {
        vec![
            "--no-playlist",
            "--no-check-certificates",
            "--quiet",
            "--no-warnings",
            "--extractor-args",
            PLAYER_CLIENTS,
            "--user-agent",
            USER_AGENT,
        ]
    }

    /// Get video information using yt-dlp
    async fn get_video_info(&self, url: &str) -> Result<Value> {
        tracing::debug!("Extracting video info for: {}", url);

        let output = Command::new(&self.yt_dlp_path)
            .args(Self::common_args())
            .arg("--dump-json")
            .arg(url)
            .kill_on_drop(true)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed: {}", error.trim());
        }

        let info: Value = serde_json::from_slice(&output.stdout)?;
        Ok(info)
    }
}

/// Arguments selecting and placing one rendition
fn download_args(kind: DownloadKind, output: &Path) -> Vec<String> {
    match kind {
        DownloadKind::Video => vec![
            "--format".to_string(),
            VIDEO_FORMAT.to_string(),
            "--merge-output-format".to_string(),
            kind.extension().to_string(),
            "--output".to_string(),
            output.to_string_lossy().into_owned(),
        ],
        DownloadKind::Audio => {
            // The mp3 extension is added by the extraction step
            let template = output.with_extension("%(ext)s");
            vec![
                "--format".to_string(),
                AUDIO_FORMAT.to_string(),
                "--extract-audio".to_string(),
                "--audio-format".to_string(),
                kind.extension().to_string(),
                "--audio-quality".to_string(),
                AUDIO_QUALITY.to_string(),
                "--output".to_string(),
                template.to_string_lossy().into_owned(),
            ]
        }
    }
}

#[async_trait]
impl MediaDownloader for YtDlpDownloader {
    async fn fetch_title(&self, link: &str) -> Result<Option<String>> {
        if !self.is_available().await {
            anyhow::bail!("yt-dlp is not available. Please install it: https://github.com/yt-dlp/yt-dlp");
        }

        let info = self.get_video_info(link).await?;
        Ok(info["title"].as_str().map(|s| s.to_string()))
    }

    async fn download(&self, link: &str, kind: DownloadKind, output: &Path) -> Result<()> {
        tracing::debug!("Running yt-dlp for {} of: {}", kind, link);

        let output = Command::new(&self.yt_dlp_path)
            .args(Self::common_args())
            .args(download_args(kind, output))
            .arg(link)
            // A timed-out stage drops this future; the process must not outlive it
            .kill_on_drop(true)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp exited with {}: {}", output.status, error.trim());
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_video_args_write_exact_path() {
        let args = download_args(DownloadKind::Video, Path::new("/media/Song_video.mp4"));
        assert_eq!(args.last().unwrap(), "/media/Song_video.mp4");
        assert!(args.contains(&VIDEO_FORMAT.to_string()));
        assert!(!args.contains(&"--extract-audio".to_string()));
    }

    #[test]
    fn test_audio_args_use_extension_template() {
        let args = download_args(DownloadKind::Audio, Path::new("/media/Song Title Live_audio.mp3"));
        assert_eq!(args.last().unwrap(), "/media/Song Title Live_audio.%(ext)s");
        assert!(args.contains(&"--extract-audio".to_string()));
        assert!(args.contains(&"192K".to_string()));
    }

    /// Stand-in for yt-dlp that answers probes at once and takes a second to "download"
    #[cfg(unix)]
    fn slow_yt_dlp(dir: &Path, marker: &Path) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("yt-dlp");
        let body = format!(
            "#!/bin/sh\ncase \"$*\" in\n  *--version*) echo 2024.01.01 ;;\n  \
             *--dump-json*) echo '{{\"title\": \"Slow Song\"}}' ;;\n  \
             *) sleep 1; touch '{}' ;;\nesac\n",
            marker.display()
        );
        std::fs::write(&script, body).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timed_out_download_stops_the_process() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("written");
        let downloader = YtDlpDownloader::new(slow_yt_dlp(dir.path(), &marker).to_string_lossy());

        assert!(downloader.is_available().await);
        assert_eq!(
            downloader.fetch_title("https://youtu.be/x").await.unwrap().as_deref(),
            Some("Slow Song")
        );

        let output = dir.path().join("Slow Song_video.mp4");
        let download = downloader.download("https://youtu.be/x", DownloadKind::Video, &output);
        assert!(tokio::time::timeout(Duration::from_millis(200), download).await.is_err());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let downloader = YtDlpDownloader::new("definitely-not-yt-dlp-binary");
        assert!(!downloader.is_available().await);
        assert!(downloader.fetch_title("https://youtu.be/x").await.is_err());
    }
}
