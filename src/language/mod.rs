use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

pub mod openai;
mod prompts;

use crate::utils::normalize_language_code;
use crate::Result;

/// Models we are willing to use, best first
pub const PREFERRED_MODELS: &[&str] = &["gpt-4o", "gpt-5-nano", "gpt-4-turbo", "gpt-3.5-turbo"];

/// How much of the transcript is sent for language detection
pub const DETECTION_SAMPLE_CHARS: usize = 500;

/// Target languages the service can deliver lyrics in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "es")]
    Spanish,
    #[serde(rename = "en")]
    English,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "de")]
    German,
    #[serde(rename = "it")]
    Italian,
    #[serde(rename = "pt")]
    Portuguese,
    #[serde(rename = "ru")]
    Russian,
    #[serde(rename = "ja")]
    Japanese,
    #[serde(rename = "ko")]
    Korean,
    #[serde(rename = "zh")]
    Chinese,
    #[serde(rename = "ar")]
    Arabic,
}

impl Language {
    pub const ALL: [Language; 11] = [
        Language::Spanish,
        Language::English,
        Language::French,
        Language::German,
        Language::Italian,
        Language::Portuguese,
        Language::Russian,
        Language::Japanese,
        Language::Korean,
        Language::Chinese,
        Language::Arabic,
    ];

    /// ISO 639-1 code
    pub fn code(&self) -> &'static str {
        match self {
            Language::Spanish => "es",
            Language::English => "en",
            Language::French => "fr",
            Language::German => "de",
            Language::Italian => "it",
            Language::Portuguese => "pt",
            Language::Russian => "ru",
            Language::Japanese => "ja",
            Language::Korean => "ko",
            Language::Chinese => "zh",
            Language::Arabic => "ar",
        }
    }

    /// Name of the language written in that language
    pub fn name(&self) -> &'static str {
        match self {
            Language::Spanish => "Español",
            Language::English => "English",
            Language::French => "Français",
            Language::German => "Deutsch",
            Language::Italian => "Italiano",
            Language::Portuguese => "Português",
            Language::Russian => "Русский",
            Language::Japanese => "日本語",
            Language::Korean => "한국어",
            Language::Chinese => "中文",
            Language::Arabic => "العربية",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|lang| lang.code() == code)
    }

    pub fn supported_codes() -> Vec<&'static str> {
        Self::ALL.iter().map(Language::code).collect()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Which language-model call was being made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ModelListing,
    Detection,
    Formatting,
    Translation,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Operation::ModelListing => "Listing available models",
            Operation::Detection => "Language detection",
            Operation::Formatting => "Text formatting",
            Operation::Translation => "Translation",
        };
        f.write_str(label)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TranslationError {
    #[error("No suitable OpenAI model found. Requires one of: {}", PREFERRED_MODELS.join(", "))]
    NoPreferredModel,

    #[error("Unsupported language: {code}. Supported languages: {}", Language::supported_codes().join(", "))]
    UnsupportedLanguage { code: String },

    #[error("{operation} failed: {message}")]
    Request { operation: Operation, message: String },

    #[error("{operation} returned an empty response")]
    EmptyResponse { operation: Operation },

    #[error("Timed out after {0:?}")]
    TimedOut(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// One non-streaming chat completion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A text-generation backend
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Ids of every model the credential can use
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Run a chat completion and return the first choice's content
    async fn complete(&self, request: ChatRequest) -> Result<String>;
}

/// Builds a generator for the credential a caller supplied
pub trait TextGeneratorFactory: Send + Sync {
    fn for_credential(&self, api_key: &str) -> Arc<dyn TextGenerator>;
}

/// Formatted original plus the text in the requested language
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedText {
    pub original: String,
    pub translated: String,
    pub detected_language: String,
}

/// Language detection, verse formatting and translation on top of a [`TextGenerator`]
pub struct LanguageClient {
    generator: Arc<dyn TextGenerator>,
    model: OnceCell<String>,
}

impl LanguageClient {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            model: OnceCell::new(),
        }
    }

    /// First preferred model the credential has access to; resolved once per client
    pub async fn preferred_model(&self) -> std::result::Result<&str, TranslationError> {
        let model = self
            .model
            .get_or_try_init(|| async {
                let available = self.generator.list_models().await.map_err(|e| {
                    TranslationError::Request {
                        operation: Operation::ModelListing,
                        message: format!("{e:#}"),
                    }
                })?;

                let model = PREFERRED_MODELS
                    .iter()
                    .find(|preferred| available.iter().any(|m| m == *preferred))
                    .ok_or(TranslationError::NoPreferredModel)?;

                tracing::info!("Using language model: {}", model);
                Ok::<_, TranslationError>(model.to_string())
            })
            .await?;

        Ok(model.as_str())
    }

    /// Ask the model which language the text is in. Only a prefix is sent.
    pub async fn detect_language(&self, text: &str) -> std::result::Result<String, TranslationError> {
        let sample: String = text.chars().take(DETECTION_SAMPLE_CHARS).collect();
        let request = ChatRequest {
            model: self.preferred_model().await?.to_string(),
            messages: vec![
                ChatMessage::system(prompts::DETECTION_SYSTEM),
                ChatMessage::user(format!("Detect the language of this text:\n\n{sample}")),
            ],
            max_tokens: 10,
            temperature: 0.0,
        };

        let code = self.call(Operation::Detection, request).await?;
        Ok(code.trim().to_lowercase())
    }

    /// Reorganize the text into verses and choruses without translating it
    pub async fn format_as_verses(&self, text: &str) -> std::result::Result<String, TranslationError> {
        let request = ChatRequest {
            model: self.preferred_model().await?.to_string(),
            messages: vec![
                ChatMessage::system(prompts::FORMAT_SYSTEM),
                ChatMessage::user(format!("Format this song transcription into proper verses:\n\n{text}")),
            ],
            max_tokens: 4096,
            temperature: 0.3,
        };

        self.call_non_empty(Operation::Formatting, request).await
    }

    /// Translate lyrics into `target`, keeping them singable rather than literal
    pub async fn translate(&self, text: &str, target: &str) -> std::result::Result<String, TranslationError> {
        let language = Language::from_code(target).ok_or_else(|| TranslationError::UnsupportedLanguage {
            code: target.to_string(),
        })?;

        let (system, user) = prompts::translation(language, text);
        let request = ChatRequest {
            model: self.preferred_model().await?.to_string(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            max_tokens: 4096,
            temperature: 0.7,
        };

        self.call_non_empty(Operation::Translation, request).await
    }

    /// Detect, format the original, and translate unless it is already in `target`
    pub async fn process(&self, original: &str, target: Language) -> std::result::Result<ProcessedText, TranslationError> {
        let detected = self.detect_language(original).await?;
        let formatted = self.format_as_verses(original).await?;

        // Codes outside the table pass through and simply never equal a target code
        let detected = normalize_language_code(&detected);
        tracing::info!("Detected language: {} (target: {})", detected, target);

        let translated = if detected == target.code() {
            tracing::info!("Transcript already in target language, skipping translation");
            formatted.clone()
        } else {
            self.translate(original, target.code()).await?
        };

        Ok(ProcessedText {
            original: formatted,
            translated,
            detected_language: detected,
        })
    }

    async fn call(&self, operation: Operation, request: ChatRequest) -> std::result::Result<String, TranslationError> {
        tracing::debug!("{} with model {}", operation, request.model);

        self.generator
            .complete(request)
            .await
            .map_err(|e| TranslationError::Request {
                operation,
                message: format!("{e:#}"),
            })
    }

    async fn call_non_empty(&self, operation: Operation, request: ChatRequest) -> std::result::Result<String, TranslationError> {
        let content = self.call(operation, request).await?;
        let content = content.trim();

        if content.is_empty() {
            return Err(TranslationError::EmptyResponse { operation });
        }

        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Answers detection with a fixed code and echoes everything else
    struct ScriptedGenerator {
        models: Vec<String>,
        detected: String,
        list_calls: Mutex<usize>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedGenerator {
        fn new(models: &[&str], detected: &str) -> Arc<Self> {
            Arc::new(Self {
                models: models.iter().map(|m| m.to_string()).collect(),
                detected: detected.to_string(),
                list_calls: Mutex::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn temperatures(&self) -> Vec<f32> {
            self.requests.lock().unwrap().iter().map(|r| r.temperature).collect()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn list_models(&self) -> Result<Vec<String>> {
            *self.list_calls.lock().unwrap() += 1;
            Ok(self.models.clone())
        }

        async fn complete(&self, request: ChatRequest) -> Result<String> {
            let reply = match request.temperature {
                t if t == 0.0 => format!("  {}\n", self.detected),
                t if t == 0.3 => "[Verse]\nhola mundo".to_string(),
                _ => format!("translated ({})", request.model),
            };
            self.requests.lock().unwrap().push(request);
            Ok(reply)
        }
    }

    #[test]
    fn test_language_codes() {
        assert_eq!(Language::supported_codes().len(), 11);
        assert_eq!(Language::from_code("ko"), Some(Language::Korean));
        assert_eq!(Language::from_code("KO"), None);
        assert_eq!(Language::default(), Language::Spanish);
        assert_eq!(serde_json::to_string(&Language::Chinese).unwrap(), "\"zh\"");
    }

    #[tokio::test]
    async fn test_model_selection_follows_preference_and_is_cached() {
        let generator = ScriptedGenerator::new(&["gpt-3.5-turbo", "whisper-1", "gpt-4-turbo"], "es");
        let client = LanguageClient::new(generator.clone());

        assert_eq!(client.preferred_model().await.unwrap(), "gpt-4-turbo");
        assert_eq!(client.preferred_model().await.unwrap(), "gpt-4-turbo");
        client.detect_language("hola").await.unwrap();
        assert_eq!(*generator.list_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_no_preferred_model() {
        let client = LanguageClient::new(ScriptedGenerator::new(&["davinci-002"], "es"));
        let err = client.detect_language("hola").await.unwrap_err();
        assert!(matches!(err, TranslationError::NoPreferredModel));
        assert!(err.to_string().contains("gpt-4o"));
    }

    #[tokio::test]
    async fn test_detection_is_trimmed_lowercased_and_sampled() {
        let generator = ScriptedGenerator::new(&["gpt-4o"], "ES");
        let client = LanguageClient::new(generator.clone());
        let long_text = "z".repeat(2_000);

        assert_eq!(client.detect_language(&long_text).await.unwrap(), "es");

        let requests = generator.requests.lock().unwrap();
        let user = &requests[0].messages[1].content;
        assert_eq!(user.matches('z').count(), DETECTION_SAMPLE_CHARS);
        assert_eq!(requests[0].max_tokens, 10);
    }

    #[tokio::test]
    async fn test_translate_rejects_unknown_target() {
        let generator = ScriptedGenerator::new(&["gpt-4o"], "es");
        let client = LanguageClient::new(generator.clone());

        let err = client.translate("hello", "nl").await.unwrap_err();
        assert!(matches!(err, TranslationError::UnsupportedLanguage { ref code } if code == "nl"));
        assert!(generator.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_process_skips_translation_for_same_language() {
        let generator = ScriptedGenerator::new(&["gpt-4o"], "spa");
        let client = LanguageClient::new(generator.clone());

        let processed = client.process("hola mundo", Language::Spanish).await.unwrap();

        assert_eq!(processed.detected_language, "es");
        assert_eq!(processed.translated, processed.original);
        assert_eq!(generator.temperatures(), vec![0.0, 0.3]);
    }

    #[tokio::test]
    async fn test_process_translates_other_language() {
        let generator = ScriptedGenerator::new(&["gpt-4o"], "es");
        let client = LanguageClient::new(generator.clone());

        let processed = client.process("hola mundo", Language::English).await.unwrap();

        assert_eq!(processed.original, "[Verse]\nhola mundo");
        assert_eq!(processed.translated, "translated (gpt-4o)");
        assert_eq!(generator.temperatures(), vec![0.0, 0.3, 0.7]);
    }

    #[tokio::test]
    async fn test_unrecognized_detection_takes_translate_branch() {
        let generator = ScriptedGenerator::new(&["gpt-4o"], "xx-unknown");
        let client = LanguageClient::new(generator.clone());

        let processed = client.process("...", Language::Spanish).await.unwrap();
        assert_eq!(processed.detected_language, "xx-unknown");
        assert_eq!(generator.temperatures().len(), 3);
    }

    #[tokio::test]
    async fn test_formatting_keeps_detected_language() {
        let generator = ScriptedGenerator::new(&["gpt-4o"], "es");
        let client = LanguageClient::new(generator);

        let formatted = client.format_as_verses("hola mundo").await.unwrap();
        assert_eq!(
            client.detect_language(&formatted).await.unwrap(),
            client.detect_language("hola mundo").await.unwrap()
        );
    }
}
