//! Ollama provider implementation.
//!
//! This module provides an Ollama HTTP API client that implements both
//! [`EmbeddingProvider`] and [`CompletionProvider`].

use super::types::*;
use crate::config::{EmbeddingConfig, LlmConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Ollama HTTP API provider.
///
/// One instance serves a single model; build two when embedding and
/// answering use different models.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
    model: String,
    temperature: f64,
    normalization: Normalization,
    http_client: reqwest::Client,
}

impl OllamaProvider {
    /// Creates a provider for `model` at `base_url`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: 0.0,
            normalization: Normalization::UnitLength,
            http_client: reqwest::Client::new(),
        }
    }

    /// Creates the answering provider described by `config`.
    pub fn for_llm(config: &LlmConfig) -> Result<Self> {
        let mut provider = Self::new(&config.base_url, &config.model)
            .with_temperature(config.temperature);
        provider.http_client = build_client(config.timeout_secs)?;
        Ok(provider)
    }

    /// Creates the embedding provider described by `config`.
    pub fn for_embedding(config: &EmbeddingConfig) -> Result<Self> {
        let mut provider = Self::new(&config.base_url, &config.model)
            .with_normalization(Normalization::from_flag(config.normalized));
        provider.http_client = build_client(config.timeout_secs)?;
        Ok(provider)
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    async fn post<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp> {
        let url = format!("{}{}", self.base_url, path);

        let response = self.http_client
            .post(&url)
            .json(body)
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

        Ok(response.json::<Resp>().await?)
    }
}

pub(crate) fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = OllamaEmbedRequest {
            model: &self.model,
            input: texts,
        };
        debug!(model = %self.model, count = texts.len(), "Requesting embeddings");

        let response: OllamaEmbedResponse = self.post("/api/embed", &request).await?;
        Ok(response.embeddings)
    }

    fn normalization(&self) -> Normalization {
        self.normalization
    }
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut options = HashMap::new();
        options.insert("temperature".to_string(), serde_json::json!(self.temperature));

        let request = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options,
        };
        debug!(model = %self.model, prompt_len = prompt.len(), "Requesting completion");

        let response: OllamaGenerateResponse = self.post("/api/generate", &request).await?;
        Ok(response.response)
    }
}

// Ollama-specific request/response types (internal)

#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    #[serde(default)]
    response: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_request_shape() {
        let texts = vec!["first".to_string(), "second".to_string()];
        let request = OllamaEmbedRequest {
            model: "nomic-embed-text",
            input: &texts,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "nomic-embed-text");
        assert_eq!(json["input"][1], "second");
    }

    #[test]
    fn test_generate_request_is_not_streaming() {
        let mut options = HashMap::new();
        options.insert("temperature".to_string(), serde_json::json!(0.0));
        let request = OllamaGenerateRequest {
            model: "llama3.2",
            prompt: "hi",
            stream: false,
            options,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["temperature"], 0.0);
    }

    #[test]
    fn test_parse_responses() {
        let embed: OllamaEmbedResponse =
            serde_json::from_str(r#"{"model":"m","embeddings":[[0.1,0.2],[0.3,0.4]]}"#).unwrap();
        assert_eq!(embed.embeddings.len(), 2);

        let generate: OllamaGenerateResponse =
            serde_json::from_str(r#"{"model":"m","response":"Paris","done":true}"#).unwrap();
        assert_eq!(generate.response, "Paris");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let provider = OllamaProvider::new("http://localhost:11434/", "m");
        assert_eq!(provider.base_url, "http://localhost:11434");
    }
}
