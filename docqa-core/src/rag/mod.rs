//! Retrieval Augmented Generation (RAG) over a single document.
//!
//! This module implements the complete question-answering pipeline: a
//! document is split, embedded and indexed once, then every question is
//! answered by a language model from the few segments that best match it.
//!
//! # Architecture
//!
//! - [`parser`]: document bytes to text (PDF or UTF-8)
//! - [`Chunker`]: overlapping fixed-size character windows
//! - [`Embedder`]: batched embedding over an [`EmbeddingProvider`]
//! - [`VectorIndex`]: brute-force cosine search over one document
//! - [`Retriever`]: maximal marginal relevance selection
//! - [`AnswerComposer`]: prompt template plus [`CompletionProvider`] call
//! - [`DocumentContext`]: the one active document, swapped atomically
//! - [`Pipeline`]: wires everything into `ingest` / `ask` / `clear`
//!
//! # How It Works
//!
//! 1. **Ingestion** (once per document):
//!    - Text is extracted and split into chunks (default: 500 characters with
//!      50 characters of overlap)
//!    - Each chunk is converted to a vector embedding
//!    - A new index is built, then swapped in as the active document
//!
//! 2. **Retrieval** (per question):
//!    - The question is embedded with the same embedder
//!    - The `fetch_k` most similar chunks form the candidate pool (default 10)
//!    - MMR picks `k` of them (default 3), trading relevance for diversity
//!
//! 3. **Generation**:
//!    - The selected chunks and the question fill the prompt template
//!    - The language model's reply is returned verbatim

mod chunker;
mod composer;
mod context;
mod embedder;
mod index;
pub mod parser;
mod retriever;
mod types;

pub use chunker::{chunk, Chunker};
pub use composer::{AnswerComposer, CONTEXT_SEPARATOR};
pub use context::{ActiveDocument, DocumentContext};
pub use embedder::{Embedder, EmbedderError};
pub use index::VectorIndex;
pub use parser::{DocumentFormat, ParseError};
pub use retriever::Retriever;
pub use types::{RetrievalRequest, ScoredSegment, Segment};

use crate::config::Config;
use crate::provider::{self, CompletionProvider, EmbeddingProvider, ProviderError};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Ingestion failed: {0}")]
    Ingestion(#[from] IngestionError),

    #[error("Embedding backend error: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("Language model error: {0}")]
    Llm(ProviderError),

    #[error("Language model returned an empty answer")]
    EmptyResponse,

    #[error("The index holds no segments")]
    EmptyIndex,

    #[error("No document has been ingested")]
    NoActiveDocument,

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl RagError {
    /// Whether the failure came from an external backend, where retrying the
    /// same call may succeed.
    pub fn is_backend(&self) -> bool {
        match self {
            RagError::Embedding(_) | RagError::Llm(_) | RagError::EmptyResponse => true,
            RagError::Ingestion(IngestionError::Embedding(_)) => true,
            _ => false,
        }
    }
}

/// Why a document could not be ingested. The previously active document, if
/// any, stays active.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Embedding(#[from] EmbedderError),

    #[error("Embedder returned {actual} vectors for {expected} segments")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Text extraction was interrupted: {0}")]
    Interrupted(String),
}

pub type Result<T> = std::result::Result<T, RagError>;

/// Summary of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub name: String,
    pub fingerprint: String,
    pub segments: usize,
    pub dimension: usize,
}

/// What is currently loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentStatus {
    pub name: String,
    pub fingerprint: String,
    pub segments: usize,
}

/// The question-answering pipeline.
///
/// Holds one [`Embedder`], one [`AnswerComposer`] and the
/// [`DocumentContext`]. A document is indexed once by [`ingest`](Self::ingest)
/// and reused by every [`ask`](Self::ask) until it is replaced or
/// [`clear`](Self::clear)ed.
///
/// # Thread Safety
///
/// `Pipeline` is `Clone`; clones share the same document context. Ingestion
/// builds the new index without holding any lock and swaps it in at the end,
/// so concurrent questions see either the old document or the new one,
/// never a mix.
///
/// # Configuration
///
/// Uses [`Config`]:
/// - `rag.chunk_size` / `rag.chunk_overlap`: chunking in characters
/// - `rag.retrieval`: `search_type`, `k`, `fetch_k`, `lambda`
/// - `rag.prompt_template`: prompt with `{context}` and `{question}`
/// - `embedding.batch_size`: texts per embedding request
#[derive(Clone)]
pub struct Pipeline {
    chunker: Chunker,
    embedder: Embedder,
    retriever: Retriever,
    composer: AnswerComposer,
    context: Arc<DocumentContext>,
}

impl Pipeline {
    /// Creates a pipeline over explicit backends.
    ///
    /// All parameters are validated here, before any backend is called.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use docqa_core::{Config, Pipeline};
    /// # use docqa_core::provider::{HashingEmbedder, OllamaProvider};
    /// # use std::sync::Arc;
    /// # async fn example() -> docqa_core::rag::Result<()> {
    /// let config = Config::default();
    /// let pipeline = Pipeline::new(
    ///     &config,
    ///     Arc::new(HashingEmbedder::new(384)),
    ///     Arc::new(OllamaProvider::new("http://localhost:11434", "llama3.2")),
    /// )?;
    /// pipeline.ingest(b"Ferris is the Rust mascot.").await?;
    /// let answer = pipeline.ask("Who is Ferris?").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(
        config: &Config,
        embedding: Arc<dyn EmbeddingProvider>,
        completion: Arc<dyn CompletionProvider>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| RagError::InvalidConfig(e.to_string()))?;

        let chunker = Chunker::new(config.rag.chunk_size, config.rag.chunk_overlap)?;
        let retriever = Retriever::from_config(&config.rag.retrieval)?;
        let embedder = Embedder::new(embedding).with_batch_size(config.embedding.batch_size);
        let composer = AnswerComposer::new(completion).with_template(config.rag.prompt_template.clone())?;

        Ok(Self {
            chunker,
            embedder,
            retriever,
            composer,
            context: Arc::new(DocumentContext::new()),
        })
    }

    /// Creates a pipeline with the backends selected in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedding = provider::embedding_provider(&config.embedding)
            .map_err(|e| RagError::InvalidConfig(e.to_string()))?;
        let completion = provider::completion_provider(&config.llm)
            .map_err(|e| RagError::InvalidConfig(e.to_string()))?;
        Self::new(config, embedding, completion)
    }

    /// Ingests an unnamed document. See [`ingest_named`](Self::ingest_named).
    pub async fn ingest(&self, document: &[u8]) -> Result<IngestReport> {
        self.ingest_named("document", document).await
    }

    /// Parses, chunks, embeds and indexes `document`, then makes it the
    /// active document.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Ingestion`] if any stage fails. In that case the
    /// previously active document (if any) is left untouched.
    pub async fn ingest_named(&self, name: &str, document: &[u8]) -> Result<IngestReport> {
        let fingerprint = format!("{:x}", Sha256::digest(document));
        info!(name, fingerprint = %&fingerprint[..12], bytes = document.len(), "Ingesting document");

        let result = self.build_document(name, fingerprint, document).await;
        let active = match result {
            Ok(active) => active,
            Err(e) => {
                warn!(name, error = %e, "Ingestion failed, keeping previous document");
                return Err(RagError::Ingestion(e));
            }
        };

        let report = IngestReport {
            name: active.name.clone(),
            fingerprint: active.fingerprint.clone(),
            segments: active.index.len(),
            dimension: active.index.dimension(),
        };

        if let Some(previous) = self.context.replace(active).await {
            debug!(previous = %previous.name, "Replaced active document");
        }
        info!(name, segments = report.segments, dimension = report.dimension, "Document ready");
        Ok(report)
    }

    async fn build_document(
        &self,
        name: &str,
        fingerprint: String,
        document: &[u8],
    ) -> std::result::Result<ActiveDocument, IngestionError> {
        let bytes = document.to_vec();
        let text = tokio::task::spawn_blocking(move || parser::extract_text(&bytes))
            .await
            .map_err(|e| IngestionError::Interrupted(e.to_string()))??;

        let segments = self.chunker.chunk(&text);
        if segments.is_empty() {
            return Err(ParseError::Empty.into());
        }
        debug!(segments = segments.len(), "Embedding segments");

        let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        let index = VectorIndex::build(segments, vectors, self.embedder.normalization())
            .map_err(|e| match e {
                RagError::DimensionMismatch { expected, actual } => {
                    IngestionError::DimensionMismatch { expected, actual }
                }
                other => IngestionError::Interrupted(other.to_string()),
            })?;

        Ok(ActiveDocument {
            name: name.to_string(),
            fingerprint,
            index,
        })
    }

    /// Retrieves the segments that would be used to answer `question`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NoActiveDocument`] before any ingestion, or an
    /// embedding error if the question cannot be embedded.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<Segment>> {
        let document = self.context.current().await.ok_or(RagError::NoActiveDocument)?;
        self.retrieve_from(&document, question).await
    }

    async fn retrieve_from(&self, document: &ActiveDocument, question: &str) -> Result<Vec<Segment>> {
        if question.trim().is_empty() {
            return Err(RagError::InvalidConfig("question must not be empty".to_string()));
        }

        debug!(document = %document.name, "Embedding question");
        let query_vector = self.embedder.embed(question).await?;
        let segments = self.retriever.select(&document.index, &query_vector)?;

        info!(
            document = %document.name,
            selected = segments.len(),
            ids = ?segments.iter().map(|s| s.id).collect::<Vec<_>>(),
            "Retrieved context"
        );
        Ok(segments)
    }

    /// Answers `question` from the active document.
    ///
    /// The active document is captured once at the start, so the whole call
    /// works against a single index even if another document is ingested
    /// concurrently.
    ///
    /// # Errors
    ///
    /// - [`RagError::NoActiveDocument`] if nothing has been ingested
    /// - [`RagError::Embedding`] if the question cannot be embedded
    /// - [`RagError::Llm`] / [`RagError::EmptyResponse`] on model failure
    pub async fn ask(&self, question: &str) -> Result<String> {
        let document = self.context.current().await.ok_or(RagError::NoActiveDocument)?;
        let segments = self.retrieve_from(&document, question).await?;
        self.composer.answer(question, &segments).await
    }

    /// Discards the active document.
    pub async fn clear(&self) {
        if let Some(previous) = self.context.clear().await {
            info!(name = %previous.name, "Cleared active document");
        }
    }

    /// Describes the active document, if any.
    pub async fn status(&self) -> Option<DocumentStatus> {
        self.context.current().await.map(|document| DocumentStatus {
            name: document.name.clone(),
            fingerprint: document.fingerprint.clone(),
            segments: document.index.len(),
        })
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }
}
