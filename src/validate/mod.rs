//! Request validation, run before any download is attempted.

use serde_json::Value;

use crate::language::Language;

/// Shortest credential we accept; a sanity check, not real key validation
pub const MIN_API_KEY_LEN: usize = 20;

/// The request was rejected before any work started
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct InvalidInput(String);

impl InvalidInput {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// A validated, normalized job request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub link: String,
    pub credential: String,
    pub target_language: Language,
}

impl JobRequest {
    /// Validate typed arguments (the CLI path) the same way a JSON body is validated
    pub fn new(link: &str, credential: &str, target_language: Option<&str>) -> Result<Self, InvalidInput> {
        let mut body = serde_json::json!({
            "link": link,
            "openai_api_key": credential,
        });
        if let Some(lang) = target_language {
            body["target_language"] = Value::String(lang.to_string());
        }
        validate(&body)
    }
}

/// Parse a raw request body; malformed JSON is reported the same way as any invalid input
pub fn parse_body(bytes: &[u8]) -> Result<Value, InvalidInput> {
    serde_json::from_slice(bytes).map_err(|_| InvalidInput::new("Invalid JSON data"))
}

/// Validate a request map and return the normalized request
pub fn validate(data: &Value) -> Result<JobRequest, InvalidInput> {
    let map = data
        .as_object()
        .ok_or_else(|| InvalidInput::new("Invalid JSON data"))?;

    let link = map
        .get("link")
        .ok_or_else(|| InvalidInput::new("Missing required field: 'link'"))?;
    let api_key = map
        .get("openai_api_key")
        .ok_or_else(|| InvalidInput::new("Missing required field: 'openai_api_key'"))?;

    let link = link
        .as_str()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| InvalidInput::new("Field 'link' must be a non-empty string"))?;

    if !is_video_link(link) {
        return Err(InvalidInput::new("Invalid YouTube URL format"));
    }

    let api_key = api_key
        .as_str()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| InvalidInput::new("Field 'openai_api_key' must be a non-empty string"))?;

    if api_key.chars().count() < MIN_API_KEY_LEN {
        return Err(InvalidInput::new("Invalid OpenAI API key format"));
    }

    let target_language = match map.get("target_language") {
        None | Some(Value::Null) => Language::default(),
        Some(Value::String(code)) => {
            let code = code.trim().to_lowercase();
            Language::from_code(&code).ok_or_else(|| {
                InvalidInput::new(format!(
                    "Unsupported language: '{}'. Supported languages: {}",
                    code,
                    Language::supported_codes().join(", ")
                ))
            })?
        }
        Some(_) => return Err(InvalidInput::new("Field 'target_language' must be a string")),
    };

    Ok(JobRequest {
        link: link.to_string(),
        credential: api_key.to_string(),
        target_language,
    })
}

/// Recognize `(https?://)?(www.)?(youtube.com/watch?v=|youtu.be/|youtube.com/embed/)<id>`,
/// matched as a prefix the way the URL is usually pasted.
pub fn is_video_link(link: &str) -> bool {
    const PREFIXES: &[&str] = &["youtube.com/watch?v=", "youtu.be/", "youtube.com/embed/"];

    let rest = strip_prefix_ignore_case(link, "https://")
        .or_else(|| strip_prefix_ignore_case(link, "http://"))
        .unwrap_or(link);
    let rest = strip_prefix_ignore_case(rest, "www.").unwrap_or(rest);

    PREFIXES.iter().any(|prefix| {
        strip_prefix_ignore_case(rest, prefix)
            .and_then(|id| id.chars().next())
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '-')
    })
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}
