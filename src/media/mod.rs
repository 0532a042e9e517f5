use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub mod youtube;

use crate::utils::{self, format_file_size};
use crate::Result;

/// Which rendition of a video to download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadKind {
    /// Best available video, kept in an mp4 container
    Video,
    /// Best available audio, transcoded to mp3
    Audio,
}

impl DownloadKind {
    pub fn extension(&self) -> &'static str {
        match self {
            DownloadKind::Video => "mp4",
            DownloadKind::Audio => "mp3",
        }
    }
}

impl fmt::Display for DownloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadKind::Video => f.write_str("video"),
            DownloadKind::Audio => f.write_str("audio"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DownloadError {
    #[error("Failed to extract title: {0}")]
    Title(String),

    #[error("Could not retrieve YouTube video title.")]
    MissingTitle,

    #[error("Could not prepare media directory {}: {source}", .path.display())]
    MediaRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{kind} download failed: {message}")]
    Failed { kind: DownloadKind, message: String },

    #[error("Failed to download {kind} file or file is empty: {}", .path.display())]
    EmptyArtifact { kind: DownloadKind, path: PathBuf },

    #[error("Timed out after {0:?}")]
    TimedOut(Duration),
}

/// A video-hosting download capability
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Title of the video, if the service reports one
    async fn fetch_title(&self, link: &str) -> Result<Option<String>>;

    /// Download one rendition so that it ends up exactly at `output`
    async fn download(&self, link: &str, kind: DownloadKind, output: &Path) -> Result<()>;

    /// Get the name of this backend
    fn name(&self) -> &'static str;
}

/// Files produced for one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaArtifacts {
    pub video_path: PathBuf,
    pub audio_path: PathBuf,
}

/// Title resolution and the two downloads, with artifact naming and verification
pub struct MediaClient {
    downloader: Arc<dyn MediaDownloader>,
    media_root: PathBuf,
}

impl MediaClient {
    pub fn new(downloader: Arc<dyn MediaDownloader>, media_root: impl Into<PathBuf>) -> Self {
        Self {
            downloader,
            media_root: media_root.into(),
        }
    }

    pub async fn resolve_title(&self, link: &str) -> std::result::Result<String, DownloadError> {
        let title = self
            .downloader
            .fetch_title(link)
            .await
            .map_err(|e| DownloadError::Title(format!("{e:#}")))?;

        match title {
            Some(title) if !title.trim().is_empty() => Ok(title),
            _ => Err(DownloadError::MissingTitle),
        }
    }

    /// Download video and audio as `<safe_title>_video.mp4` and `<safe_title>_audio.mp3`
    pub async fn fetch(&self, link: &str, title: &str) -> std::result::Result<MediaArtifacts, DownloadError> {
        tokio::fs::create_dir_all(&self.media_root)
            .await
            .map_err(|source| DownloadError::MediaRoot {
                path: self.media_root.clone(),
                source,
            })?;

        let video_path = utils::video_path(&self.media_root, title);
        let audio_path = utils::audio_path(&self.media_root, title);

        // Separate invocations: the audio needs transcoding, the video does not
        self.download_one(link, DownloadKind::Video, &video_path).await?;
        self.download_one(link, DownloadKind::Audio, &audio_path).await?;

        Ok(MediaArtifacts { video_path, audio_path })
    }

    async fn download_one(&self, link: &str, kind: DownloadKind, path: &Path) -> std::result::Result<(), DownloadError> {
        tracing::info!("Downloading {} with {} to: {}", kind, self.downloader.name(), path.display());

        self.downloader
            .download(link, kind, path)
            .await
            .map_err(|e| DownloadError::Failed {
                kind,
                message: format!("{e:#}"),
            })?;

        let size = non_empty_file_size(path).await.ok_or_else(|| DownloadError::EmptyArtifact {
            kind,
            path: path.to_path_buf(),
        })?;

        tracing::debug!("Downloaded {} ({})", kind, format_file_size(size));
        Ok(())
    }
}

async fn non_empty_file_size(path: &Path) -> Option<u64> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    (metadata.is_file() && metadata.len() > 0).then_some(metadata.len())
}
