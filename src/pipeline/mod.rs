use anyhow::Context;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

mod locks;

pub use locks::{KeyedGuard, KeyedLocks};

use crate::config::Config;
use crate::language::openai::OpenAiFactory;
use crate::language::{Language, LanguageClient, TextGeneratorFactory, TranslationError};
use crate::media::youtube::YtDlpDownloader;
use crate::media::{DownloadError, MediaClient};
use crate::store::JobStore;
use crate::transcribe::assemblyai::AssemblyAiTranscriber;
use crate::transcribe::{TranscriptionClient, TranscriptionError};
use crate::utils::{extract_domain, format_duration, safe_title};
use crate::validate::{self, JobRequest};
use crate::GeneratorError;

/// Where a job is. Stages only move forward; a failure ends the job in whichever stage it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Validate,
    FetchTitle,
    Download,
    Transcribe,
    Translate,
    Persist,
    Done,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStage::Validate => "validate",
            JobStage::FetchTitle => "fetch-title",
            JobStage::Download => "download",
            JobStage::Transcribe => "transcribe",
            JobStage::Translate => "translate",
            JobStage::Persist => "persist",
            JobStage::Done => "done",
        };
        f.write_str(label)
    }
}

/// Everything a successful job produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobResult {
    pub title: String,
    /// Lyrics in the target language
    pub content: String,
    /// Lyrics in the original language, formatted into verses
    pub original_transcription: String,
    pub video_file: PathBuf,
    pub audio_file: PathBuf,
    pub transcript_file: PathBuf,
    pub target_language: Language,
    pub detected_language: String,
    pub record_id: i64,
}

/// Title → download → transcribe → translate → persist, strictly in that order
pub struct TranslationPipeline {
    media: MediaClient,
    transcription: TranscriptionClient,
    generators: Arc<dyn TextGeneratorFactory>,
    store: Arc<dyn JobStore>,
    stage_timeout: Duration,
    title_locks: KeyedLocks,
}

impl TranslationPipeline {
    pub fn new(
        media: MediaClient,
        transcription: TranscriptionClient,
        generators: Arc<dyn TextGeneratorFactory>,
        store: Arc<dyn JobStore>,
    ) -> Self {
        Self {
            media,
            transcription,
            generators,
            store,
            stage_timeout: Duration::from_secs(900),
            title_locks: KeyedLocks::new(),
        }
    }

    /// Upper bound for each external stage
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Wire up yt-dlp, AssemblyAI and OpenAI from configuration
    pub fn from_config(config: &Config, store: Arc<dyn JobStore>) -> crate::Result<Self> {
        let downloader = YtDlpDownloader::new(config.media.yt_dlp_path.clone());
        let transcriber = AssemblyAiTranscriber::new(
            config.require_assemblyai_key()?,
            config.services.assemblyai_base_url.clone(),
            config.request_timeout(),
            Duration::from_secs(config.pipeline.poll_interval_secs),
            Duration::from_secs(config.pipeline.transcription_timeout_secs),
        )
        .context("Failed to set up transcription client")?;
        let generators = OpenAiFactory::new(config.services.openai_base_url.clone(), config.request_timeout())
            .context("Failed to set up language model client")?;

        Ok(Self::new(
            MediaClient::new(Arc::new(downloader), config.media.root.clone()),
            TranscriptionClient::new(Arc::new(transcriber), config.media.root.clone()),
            Arc::new(generators),
            store,
        )
        .with_stage_timeout(config.stage_timeout()))
    }

    /// Validate a raw request body, then run the job
    pub async fn run_raw(&self, body: &serde_json::Value) -> Result<JobResult, GeneratorError> {
        let request = validate::validate(body).map_err(|e| {
            tracing::debug!("Rejected request during {}: {}", JobStage::Validate, e);
            e
        })?;
        self.run(&request).await
    }

    pub async fn run(&self, request: &JobRequest) -> Result<JobResult, GeneratorError> {
        let span = tracing::info_span!("job", id = %Uuid::new_v4());

        async move {
            let started = Instant::now();
            let mut stage = JobStage::FetchTitle;

            let result = self.execute(request, &mut stage).await;
            match &result {
                Ok(job) => tracing::info!(
                    "Job finished in {} (record {})",
                    format_duration(started.elapsed().as_secs_f64()),
                    job.record_id
                ),
                // Downloaded files stay on disk; the cleanup sweep removes them later
                Err(e) => tracing::error!("Job failed during {}: {}", stage, e),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, request: &JobRequest, stage: &mut JobStage) -> Result<JobResult, GeneratorError> {
        let limit = self.stage_timeout;
        let link = request.link.as_str();
        let target = request.target_language;

        tracing::info!(
            "Fetching title for {} link: {}",
            extract_domain(link).unwrap_or_else(|| "video".to_string()),
            link
        );
        let title = within(limit, self.media.resolve_title(link), DownloadError::TimedOut).await?;
        tracing::info!("Video title: {}", title);

        // Same safe title means same file names; one job at a time per name
        let _guard = self.title_locks.acquire(&safe_title(&title)).await;

        *stage = JobStage::Download;
        let artifacts = within(limit, self.media.fetch(link, &title), DownloadError::TimedOut).await?;
        tracing::info!(
            "Downloaded - Video: {}, Audio: {}",
            artifacts.video_path.display(),
            artifacts.audio_path.display()
        );

        *stage = JobStage::Transcribe;
        let original_text = within(
            limit,
            self.transcription.transcribe(&artifacts.audio_path, &title),
            TranscriptionError::TimedOut,
        )
        .await?;
        tracing::info!("Transcription complete, length: {} chars", original_text.chars().count());

        *stage = JobStage::Translate;
        tracing::info!("Processing translation and formatting (target language: {})", target);
        let language = LanguageClient::new(self.generators.for_credential(&request.credential));
        let processed = within(limit, language.process(&original_text, target), TranslationError::TimedOut).await?;

        *stage = JobStage::Persist;
        let record_id = self.store.save(&title, link, &processed.translated).await?;
        tracing::info!("Saved translation to database, ID: {}", record_id);

        *stage = JobStage::Done;
        Ok(JobResult {
            transcript_file: self.transcription.transcript_path(&title),
            title,
            content: processed.translated,
            original_transcription: processed.original,
            video_file: artifacts.video_path,
            audio_file: artifacts.audio_path,
            target_language: target,
            detected_language: processed.detected_language,
            record_id,
        })
    }
}

/// Bound a stage by `limit`, reporting an elapsed timeout as that stage's own error
async fn within<T, E, F>(limit: Duration, fut: F, timed_out: fn(Duration) -> E) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .unwrap_or_else(|_| Err(timed_out(limit)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_within_maps_timeout_to_stage_error() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, DownloadError>("never")
        };

        let err = within(Duration::from_millis(10), slow, DownloadError::TimedOut).await.unwrap_err();
        assert!(matches!(err, DownloadError::TimedOut(d) if d == Duration::from_millis(10)));
    }

    #[tokio::test]
    async fn test_within_passes_result_through() {
        let fast = async { Ok::<_, TranscriptionError>(42) };
        assert_eq!(within(Duration::from_secs(1), fast, TranscriptionError::TimedOut).await.unwrap(), 42);
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(JobStage::FetchTitle.to_string(), "fetch-title");
        assert_eq!(JobStage::Done.to_string(), "done");
    }
}
