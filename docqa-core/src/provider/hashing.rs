//! Local embedding backend based on character n-gram feature hashing.
//!
//! No model and no network: every character trigram of the lowercased text is
//! hashed into one of `dimension` buckets with a hash-derived sign, and the
//! resulting vector is scaled to unit length. Texts sharing many trigrams end
//! up with high cosine similarity, which is enough for offline use and tests.

use super::types::*;
use async_trait::async_trait;
use std::hash::Hasher;
use twox_hash::XxHash64;

const NGRAM: usize = 3;

/// Deterministic, dependency-free [`EmbeddingProvider`].
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embeds a single text.
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let chars: Vec<char> = text.to_lowercase().chars().collect();

        if chars.is_empty() {
            return vector;
        }

        let window = NGRAM.min(chars.len());
        for gram in chars.windows(window) {
            let mut hasher = XxHash64::with_seed(0);
            for c in gram {
                hasher.write_u32(*c as u32);
            }
            let hash = hasher.finish();
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }

    fn normalization(&self) -> Normalization {
        Normalization::UnitLength
    }
}
