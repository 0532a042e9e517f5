use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::time::sleep;

use super::SpeechToText;
use crate::Result;

const MAX_POLL_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TranscriptStatus {
    Queued,
    Processing,
    Completed,
    Error,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct Transcript {
    id: String,
    status: TranscriptStatus,
    text: Option<String>,
    error: Option<String>,
    language_code: Option<String>,
}

/// AssemblyAI speech-to-text: upload, create a transcript job, poll until it settles
pub struct AssemblyAiTranscriber {
    client: Client,
    api_key: String,
    base_url: String,
    poll_interval: Duration,
    timeout: Duration,
}

impl AssemblyAiTranscriber {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        request_timeout: Duration,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll_interval,
            timeout,
        })
    }

    /// Upload the local file and return the URL AssemblyAI can read it from
    async fn upload(&self, audio_path: &Path) -> Result<String> {
        let content = tokio::fs::read(audio_path)
            .await
            .with_context(|| format!("Failed to read audio file {}", audio_path.display()))?;

        tracing::info!("Uploading {} bytes of audio to AssemblyAI", content.len());

        let response = self
            .client
            .post(format!("{}/v2/upload", self.base_url))
            .header("authorization", &self.api_key)
            .header("content-type", "application/octet-stream")
            .body(content)
            .send()
            .await
            .context("Failed to upload audio")?;

        let upload: UploadResponse = check_status(response)
            .await?
            .json()
            .await
            .context("Failed to parse upload response")?;

        Ok(upload.upload_url)
    }

    async fn start_transcript(&self, audio_url: &str) -> Result<Transcript> {
        let response = self
            .client
            .post(format!("{}/v2/transcript", self.base_url))
            .header("authorization", &self.api_key)
            .json(&serde_json::json!({
                "audio_url": audio_url,
                "language_detection": true,
            }))
            .send()
            .await
            .context("Failed to start transcription")?;

        check_status(response)
            .await?
            .json()
            .await
            .context("Failed to parse transcript response")
    }

    async fn get_transcript(&self, id: &str) -> Result<Transcript> {
        let response = self
            .client
            .get(format!("{}/v2/transcript/{}", self.base_url, id))
            .header("authorization", &self.api_key)
            .send()
            .await
            .context("Failed to get transcription status")?;

        check_status(response)
            .await?
            .json()
            .await
            .context("Failed to parse transcript response")
    }

    /// Poll until the transcript completes, fails, or the timeout passes
    async fn wait_for_completion(&self, mut transcript: Transcript) -> Result<String> {
        let start_time = Instant::now();
        let mut check_count: u32 = 0;

        loop {
            match transcript.status {
                TranscriptStatus::Completed => {
                    tracing::info!(
                        "Transcription {} completed in {:.1}s (language: {})",
                        transcript.id,
                        start_time.elapsed().as_secs_f64(),
                        transcript.language_code.as_deref().unwrap_or("unknown")
                    );
                    return Ok(transcript.text.unwrap_or_default());
                }
                TranscriptStatus::Error => {
                    let reason = transcript.error.as_deref().unwrap_or("Unknown error");
                    anyhow::bail!("Transcription job failed: {}", reason);
                }
                TranscriptStatus::Unknown => {
                    anyhow::bail!("Unexpected transcription job status");
                }
                TranscriptStatus::Queued | TranscriptStatus::Processing => {}
            }

            if start_time.elapsed() >= self.timeout {
                anyhow::bail!(
                    "Transcription {} did not finish within {}s",
                    transcript.id,
                    self.timeout.as_secs()
                );
            }

            check_count += 1;
            tracing::debug!(
                "Transcribing... ({}s elapsed, check #{})",
                start_time.elapsed().as_secs(),
                check_count
            );
            sleep(poll_delay(self.poll_interval, check_count)).await;

            transcript = self.get_transcript(&transcript.id).await?;
        }
    }
}

/// Grows by one second per check, capped
fn poll_delay(base: Duration, check_count: u32) -> Duration {
    (base + Duration::from_secs(u64::from(check_count.saturating_sub(1)))).min(MAX_POLL_INTERVAL)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    anyhow::bail!("AssemblyAI returned {}: {}", status, body.trim())
}

#[async_trait]
impl SpeechToText for AssemblyAiTranscriber {
    async fn transcribe_file(&self, audio_path: &Path) -> Result<String> {
        let audio_url = self.upload(audio_path).await?;
        let transcript = self.start_transcript(&audio_url).await?;
        tracing::info!("Started transcription job: {}", transcript.id);

        self.wait_for_completion(transcript).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcriber(timeout: Duration) -> AssemblyAiTranscriber {
        AssemblyAiTranscriber::new(
            "aai-key",
            "http://127.0.0.1:9/",
            Duration::from_secs(1),
            Duration::from_millis(10),
            timeout,
        )
        .unwrap()
    }

    fn transcript(status: TranscriptStatus, text: Option<&str>, error: Option<&str>) -> Transcript {
        Transcript {
            id: "tr_1".to_string(),
            status,
            text: text.map(str::to_string),
            error: error.map(str::to_string),
            language_code: Some("es".to_string()),
        }
    }

    #[test]
    fn test_status_parsing() {
        let json = r#"{"id": "abc", "status": "processing", "text": null}"#;
        let parsed: Transcript = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.status, TranscriptStatus::Processing);

        let json = r#"{"id": "abc", "status": "paused"}"#;
        let parsed: Transcript = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.status, TranscriptStatus::Unknown);
    }

    #[test]
    fn test_poll_delay_is_capped() {
        let base = Duration::from_secs(3);
        assert_eq!(poll_delay(base, 1), Duration::from_secs(3));
        assert_eq!(poll_delay(base, 4), Duration::from_secs(6));
        assert_eq!(poll_delay(base, 100), MAX_POLL_INTERVAL);
    }

    #[tokio::test]
    async fn test_completed_returns_text() {
        let t = transcriber(Duration::from_secs(5));
        let text = t
            .wait_for_completion(transcript(TranscriptStatus::Completed, Some("hola mundo"), None))
            .await
            .unwrap();
        assert_eq!(text, "hola mundo");
    }

    #[tokio::test]
    async fn test_error_status_reports_reason() {
        let t = transcriber(Duration::from_secs(5));
        let err = t
            .wait_for_completion(transcript(TranscriptStatus::Error, None, Some("bad audio")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bad audio"));
    }

    #[tokio::test]
    async fn test_zero_timeout_stops_polling() {
        let t = transcriber(Duration::ZERO);
        let err = t
            .wait_for_completion(transcript(TranscriptStatus::Queued, None, None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("did not finish"));
    }

    #[test]
    fn test_base_url_is_trimmed() {
        assert_eq!(transcriber(Duration::from_secs(1)).base_url, "http://127.0.0.1:9");
    }
}
