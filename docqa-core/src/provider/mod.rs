//! Embedding and language-model provider abstraction layer.
//!
//! The pipeline depends only on the two capability traits defined here:
//! [`EmbeddingProvider`] (`embed`) and [`CompletionProvider`] (`generate`).
//! Concrete backends: Ollama (both), Gemini (completion) and a local
//! hashing embedder.

mod types;
pub mod gemini;
pub mod hashing;
pub mod ollama;

// Re-export common types
pub use types::{
    CompletionProvider,
    EmbeddingProvider,
    Normalization,
    ProviderError,
    Result,
};

// Re-export provider implementations
pub use gemini::GeminiProvider;
pub use hashing::HashingEmbedder;
pub use ollama::OllamaProvider;

use crate::config::{EmbeddingBackend, EmbeddingConfig, LlmBackend, LlmConfig};
use std::sync::Arc;

/// Builds the embedding backend selected in `config`.
pub fn embedding_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider {
        EmbeddingBackend::Ollama => Ok(Arc::new(OllamaProvider::for_embedding(config)?)),
        EmbeddingBackend::Hashing => Ok(Arc::new(HashingEmbedder::new(config.dimension))),
    }
}

/// Builds the answering backend selected in `config`.
pub fn completion_provider(config: &LlmConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.provider {
        LlmBackend::Ollama => Ok(Arc::new(OllamaProvider::for_llm(config)?)),
        LlmBackend::Gemini => Ok(Arc::new(GeminiProvider::from_config(config)?)),
    }
}
