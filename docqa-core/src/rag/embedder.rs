//! Embedding generation on top of an [`EmbeddingProvider`].
//!
//! The provider does the model work; this wrapper batches requests and checks
//! the provider kept its side of the contract (one vector per input, one
//! dimension for all of them).

use crate::provider::{EmbeddingProvider, Normalization, ProviderError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur during embedding generation.
#[derive(Debug, Error)]
pub enum EmbedderError {
    /// The provider API returned an error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The provider returned a different number of vectors than texts sent.
    #[error("Expected {expected} embeddings, provider returned {actual}")]
    CountMismatch { expected: usize, actual: usize },

    /// Vectors of one request disagree on their length.
    #[error("Embedding {position} has dimension {actual}, expected {expected}")]
    InconsistentDimension {
        expected: usize,
        actual: usize,
        position: usize,
    },

    /// A vector holds NaN or an infinite component.
    #[error("Embedding {position} has a non-finite component")]
    NonFinite { position: usize },

    /// The provider returned empty vectors.
    #[error("No embeddings returned")]
    NoEmbeddings,
}

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedderError>;

/// Default number of texts per provider call.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Generates vector embeddings for document segments and questions.
///
/// Vectors are only comparable when they come from the same `Embedder`, so a
/// pipeline holds exactly one.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Normalization declared by the underlying provider.
    pub fn normalization(&self) -> Normalization {
        self.provider.normalization()
    }

    /// Generates one vector per text, in input order.
    ///
    /// Texts are sent in batches of `batch_size`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The provider is unreachable or rejects the request
    /// - A batch comes back with the wrong number of vectors
    /// - Vectors are empty or differ in dimension
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for (batch_idx, batch) in texts.chunks(self.batch_size).enumerate() {
            debug!(batch = batch_idx, size = batch.len(), "Embedding batch");
            let embedded = self.provider.embed(batch).await?;

            if embedded.len() != batch.len() {
                return Err(EmbedderError::CountMismatch {
                    expected: batch.len(),
                    actual: embedded.len(),
                });
            }
            vectors.extend(embedded);
        }

        check_dimensions(&vectors)?;

        if !texts.is_empty() {
            info!(count = vectors.len(), dimension = vectors[0].len(), "Generated embeddings");
        }
        Ok(vectors)
    }

    /// Generates a vector for a single text, typically a question.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or(EmbedderError::NoEmbeddings)
    }
}

fn check_dimensions(vectors: &[Vec<f32>]) -> Result<()> {
    let Some(first) = vectors.first() else {
        return Ok(());
    };
    let expected = first.len();
    if expected == 0 {
        return Err(EmbedderError::NoEmbeddings);
    }

    for (position, vector) in vectors.iter().enumerate() {
        if vector.len() != expected {
            return Err(EmbedderError::InconsistentDimension {
                expected,
                actual: vector.len(),
                position,
            });
        }
        if !vector.iter().all(|x| x.is_finite()) {
            return Err(EmbedderError::NonFinite { position });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns `[len, calls]` per text, optionally dropping the last vector.
    struct CountingProvider {
        calls: AtomicUsize,
        drop_last: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed(&self, texts: &[String]) -> crate::provider::Result<Vec<Vec<f32>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as f32;
            let mut out: Vec<Vec<f32>> = texts.iter().map(|t| vec![t.len() as f32, call]).collect();
            if self.drop_last {
                out.pop();
            }
            Ok(out)
        }

        fn normalization(&self) -> Normalization {
            Normalization::Unnormalized
        }
    }

    struct RaggedProvider;

    #[async_trait]
    impl EmbeddingProvider for RaggedProvider {
        async fn embed(&self, texts: &[String]) -> crate::provider::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().enumerate().map(|(i, _)| vec![1.0; i + 1]).collect())
        }

        fn normalization(&self) -> Normalization {
            Normalization::UnitLength
        }
    }

    /// Puts NaN into the second vector.
    struct NanProvider;

    #[async_trait]
    impl EmbeddingProvider for NanProvider {
        async fn embed(&self, texts: &[String]) -> crate::provider::Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .enumerate()
                .map(|(i, _)| if i == 1 { vec![f32::NAN, 0.0] } else { vec![1.0, 0.0] })
                .collect())
        }

        fn normalization(&self) -> Normalization {
            Normalization::UnitLength
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| "t".repeat(i + 1)).collect()
    }

    #[tokio::test]
    async fn test_batches_preserve_order() {
        let provider = Arc::new(CountingProvider { calls: AtomicUsize::new(0), drop_last: false });
        let embedder = Embedder::new(provider.clone()).with_batch_size(2);

        let vectors = embedder.embed_batch(&texts(5)).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        let lengths: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
        assert_eq!(lengths, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(vectors[4][1], 2.0);
    }

    #[tokio::test]
    async fn test_count_mismatch() {
        let provider = Arc::new(CountingProvider { calls: AtomicUsize::new(0), drop_last: true });
        let embedder = Embedder::new(provider);

        let err = embedder.embed_batch(&texts(3)).await.unwrap_err();
        assert!(matches!(err, EmbedderError::CountMismatch { expected: 3, actual: 2 }));
    }

    #[tokio::test]
    async fn test_inconsistent_dimension() {
        let embedder = Embedder::new(Arc::new(RaggedProvider));
        let err = embedder.embed_batch(&texts(2)).await.unwrap_err();
        assert!(matches!(
            err,
            EmbedderError::InconsistentDimension { expected: 1, actual: 2, position: 1 }
        ));
    }

    #[tokio::test]
    async fn test_single_embed() {
        let provider = Arc::new(CountingProvider { calls: AtomicUsize::new(0), drop_last: false });
        let embedder = Embedder::new(provider);
        assert_eq!(embedder.embed("abc").await.unwrap(), vec![3.0, 0.0]);
        assert_eq!(embedder.normalization(), Normalization::Unnormalized);
    }

    #[tokio::test]
    async fn test_non_finite_vector_rejected() {
        let embedder = Embedder::new(Arc::new(NanProvider));
        let err = embedder.embed_batch(&texts(3)).await.unwrap_err();
        assert!(matches!(err, EmbedderError::NonFinite { position: 1 }));
    }
}
