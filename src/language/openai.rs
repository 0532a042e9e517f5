use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::{ChatRequest, TextGenerator, TextGeneratorFactory};
use crate::Result;

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// OpenAI chat-completions backend
pub struct OpenAiGenerator {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiGenerator {
    pub fn new(client: Client, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or(body);
        anyhow::bail!("OpenAI API returned {}: {}", status, message)
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/v1/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("Failed to reach OpenAI")?;

        let models: ModelList = Self::check_status(response)
            .await?
            .json()
            .await
            .context("Failed to parse model list")?;

        Ok(models.data.into_iter().map(|m| m.id).collect())
    }

    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": request.model,
                "messages": request.messages,
                "max_tokens": request.max_tokens,
                "temperature": request.temperature,
                "stream": false,
            }))
            .send()
            .await
            .context("Failed to reach OpenAI")?;

        let completion: ChatCompletion = Self::check_status(response)
            .await?
            .json()
            .await
            .context("Failed to parse chat completion")?;

        first_choice(completion)
    }
}

fn first_choice(completion: ChatCompletion) -> Result<String> {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow::anyhow!("Chat completion contained no message content"))
}

/// Hands out an [`OpenAiGenerator`] per caller-supplied key, sharing one connection pool
pub struct OpenAiFactory {
    client: Client,
    base_url: String,
}

impl OpenAiFactory {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

impl TextGeneratorFactory for OpenAiFactory {
    fn for_credential(&self, api_key: &str) -> Arc<dyn TextGenerator> {
        Arc::new(OpenAiGenerator::new(self.client.clone(), api_key, self.base_url.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_list() {
        let json = r#"{"object": "list", "data": [{"id": "gpt-4o", "object": "model"}, {"id": "whisper-1"}]}"#;
        let models: ModelList = serde_json::from_str(json).unwrap();
        let ids: Vec<String> = models.data.into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["gpt-4o", "whisper-1"]);
    }

    #[test]
    fn test_first_choice() {
        let json = r#"{"choices": [{"index": 0, "message": {"role": "assistant", "content": "es"}}]}"#;
        let completion: ChatCompletion = serde_json::from_str(json).unwrap();
        assert_eq!(first_choice(completion).unwrap(), "es");

        let empty: ChatCompletion = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(first_choice(empty).is_err());

        let refusal: ChatCompletion =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert!(first_choice(refusal).is_err());
    }

    #[test]
    fn test_base_url_is_trimmed() {
        let generator = OpenAiGenerator::new(Client::new(), "sk-test", "https://api.openai.com/");
        assert_eq!(generator.base_url, "https://api.openai.com");
    }
}
