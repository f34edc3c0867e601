//! Common types for embedding and language-model providers.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when interacting with a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The backend refused to answer (safety filter, empty candidate list).
    #[error("Response blocked: {0}")]
    Blocked(String),

    #[error("Provider error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Whether a backend's vectors are unit length.
///
/// For unit vectors cosine similarity and dot product coincide, so the index
/// can skip the magnitude computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    UnitLength,
    Unnormalized,
}

impl Normalization {
    pub fn from_flag(normalized: bool) -> Self {
        if normalized {
            Self::UnitLength
        } else {
            Self::Unnormalized
        }
    }
}

/// Backend that maps text to vectors.
///
/// Vectors from the same instance are comparable by cosine similarity;
/// nothing else about the model is assumed.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed every text, returning one vector per input in the same order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Normalization convention of the returned vectors.
    fn normalization(&self) -> Normalization;
}

/// Backend that turns a prompt into an answer.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a completion for `prompt`, returned verbatim.
    async fn generate(&self, prompt: &str) -> Result<String>;
}
