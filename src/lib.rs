//! Translation Generator - turn a YouTube song into verse-formatted lyrics in another language
//!
//! This library downloads a video and its audio track with yt-dlp, transcribes the audio
//! through a speech-to-text service, and formats/translates the transcript with a
//! language model. Every completed job is recorded in a SQLite database.

pub mod cleanup;
pub mod cli;
pub mod config;
pub mod language;
pub mod media;
pub mod output;
pub mod pipeline;
pub mod server;
pub mod store;
pub mod transcribe;
pub mod utils;
pub mod validate;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use language::{Language, LanguageClient, ProcessedText, TextGenerator, TranslationError};
pub use media::{DownloadError, MediaArtifacts, MediaClient, MediaDownloader};
pub use pipeline::{JobResult, TranslationPipeline};
pub use store::{JobRecord, JobStore, SqliteJobStore, StoreError};
pub use transcribe::{SpeechToText, TranscriptionClient, TranscriptionError};
pub use validate::{InvalidInput, JobRequest};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Every way a translation job can fail, one variant per pipeline stage
#[derive(thiserror::Error, Debug)]
pub enum GeneratorError {
    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),

    #[error("Download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("Transcription failed: {0}")]
    Transcription(#[from] TranscriptionError),

    #[error("Translation failed: {0}")]
    Translation(#[from] TranslationError),

    #[error("Saving the result failed: {0}")]
    Persistence(#[from] StoreError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}
