//! docqa-core - Question answering over a single document
//!
//! Provides the building blocks of a PDF question-answering pipeline:
//! - Embedding and language-model provider abstraction (Ollama, Gemini, local hashing)
//! - RAG (chunking, vector index, MMR retrieval, answer composition)
//! - Configuration management
//!
//! ## Primary API
//!
//! Users should interact with docqa via [`Pipeline`]: `ingest`, `ask`, `clear`.

// Public modules
pub mod config;
pub mod provider;
pub mod rag;

// Public exports
pub use config::{Config, ConfigError, RagConfig, RetrievalConfig, SearchType};
pub use rag::{IngestReport, IngestionError, Pipeline, RagError, Segment};

// Provider exports
pub use provider::{
    CompletionProvider, EmbeddingProvider, GeminiProvider, HashingEmbedder, Normalization,
    OllamaProvider, ProviderError,
};
