use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub mod assemblyai;

use crate::utils;
use crate::Result;

#[derive(thiserror::Error, Debug)]
pub enum TranscriptionError {
    #[error("Transcription returned empty result.")]
    EmptyResult,

    #[error("{0}")]
    Service(String),

    #[error("Failed to save transcript to {}: {source}", .path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {0:?}")]
    TimedOut(Duration),
}

/// A speech-to-text capability
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe a local audio file and return the full text
    async fn transcribe_file(&self, audio_path: &Path) -> Result<String>;
}

/// Transcribes an audio artifact and keeps a copy of the text next to it
pub struct TranscriptionClient {
    engine: Arc<dyn SpeechToText>,
    media_root: PathBuf,
}

impl TranscriptionClient {
    pub fn new(engine: Arc<dyn SpeechToText>, media_root: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            media_root: media_root.into(),
        }
    }

    /// Where the transcript for `title` is written
    pub fn transcript_path(&self, title: &str) -> PathBuf {
        utils::transcript_path(&self.media_root, title)
    }

    pub async fn transcribe(&self, audio_path: &Path, title: &str) -> std::result::Result<String, TranscriptionError> {
        let text = self
            .engine
            .transcribe_file(audio_path)
            .await
            .map_err(|e| TranscriptionError::Service(format!("{e:#}")))?;

        if text.trim().is_empty() {
            return Err(TranscriptionError::EmptyResult);
        }

        let path = self.transcript_path(title);
        tokio::fs::write(&path, &text)
            .await
            .map_err(|source| TranscriptionError::Save { path: path.clone(), source })?;
        tracing::debug!("Transcript saved to: {}", path.display());

        Ok(text)
    }
}
