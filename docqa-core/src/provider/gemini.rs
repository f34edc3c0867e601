//! Google Gemini provider implementation.
//!
//! Talks to the Generative Language REST API (`generateContent`).

use super::ollama::build_client;
use super::types::*;
use crate::config::LlmConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Gemini HTTP API provider.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    base_url: String,
    model: String,
    /// Checked on the first request, so pipelines that never answer
    /// questions do not need a key.
    api_key: Option<String>,
    temperature: f64,
    http_client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            api_key: Some(api_key.into()),
            temperature: 0.0,
            http_client: reqwest::Client::new(),
        }
    }

    /// Creates the provider described by `config`. `llm.base_url` is only
    /// meaningful for Ollama and is not used here.
    ///
    /// The key comes from `llm.api_key`, then [`API_KEY_ENV`]. A missing key
    /// is reported by [`generate`](CompletionProvider::generate).
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config.api_key.clone().or_else(|| std::env::var(API_KEY_ENV).ok());
        if api_key.is_none() {
            warn!("No Gemini API key configured and {} is unset", API_KEY_ENV);
        }

        let mut provider = Self::new(&config.model, "").with_temperature(config.temperature);
        provider.api_key = api_key;
        provider.http_client = build_client(config.timeout_secs)?;
        Ok(provider)
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request_body<'a>(&self, prompt: &'a str) -> GenerateContentRequest<'a> {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        }
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::Other(format!("No Gemini API key configured and {} is unset", API_KEY_ENV))
        })?;
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        debug!(model = %self.model, prompt_len = prompt.len(), "Requesting Gemini completion");

        let response = self.http_client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&self.request_body(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body: error_text,
            });
        }

        let body = response.json::<GenerateContentResponse>().await?;
        extract_text(body)
    }
}

/// Concatenates the text parts of the first candidate.
fn extract_text(response: GenerateContentResponse) -> Result<String> {
    let candidate = match response.candidates.into_iter().next() {
        Some(candidate) => candidate,
        None => {
            let reason = response
                .prompt_feedback
                .and_then(|feedback| feedback.block_reason)
                .unwrap_or_else(|| "no candidates returned".to_string());
            return Err(ProviderError::Blocked(reason));
        }
    };

    let text: String = candidate
        .content
        .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "empty candidate".to_string());
        return Err(ProviderError::Blocked(reason));
    }

    Ok(text)
}

// Gemini-specific request/response types (internal)

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let provider = GeminiProvider::new("gemini-pro", "key");
        let json = serde_json::to_value(provider.request_body("What is RAG?")).unwrap();

        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "What is RAG?");
        assert_eq!(json["generationConfig"]["temperature"], 0.0);
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let body: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello, "},{"text":"world"}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(body).unwrap(), "Hello, world");
    }

    #[test]
    fn test_blocked_prompt() {
        let body: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        match extract_text(body) {
            Err(ProviderError::Blocked(reason)) => assert_eq!(reason, "SAFETY"),
            other => panic!("expected blocked error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_candidate_is_blocked() {
        let body: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"RECITATION"}]}"#).unwrap();
        assert!(matches!(extract_text(body), Err(ProviderError::Blocked(_))));
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let config = LlmConfig {
            provider: crate::config::LlmBackend::Gemini,
            model: "gemini-pro".to_string(),
            api_key: Some("from-config".to_string()),
            ..LlmConfig::default()
        };
        let provider = GeminiProvider::from_config(&config).unwrap();
        assert_eq!(provider.api_key.as_deref(), Some("from-config"));
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
    }

    #[tokio::test]
    async fn test_missing_key_fails_on_generate() {
        let mut provider = GeminiProvider::new("gemini-pro", "key").with_base_url("http://127.0.0.1:9");
        provider.api_key = None;

        match provider.generate("Anything?").await {
            Err(ProviderError::Other(message)) => assert!(message.contains(API_KEY_ENV)),
            other => panic!("expected missing key error, got {:?}", other),
        }
    }
}
