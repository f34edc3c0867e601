//! In-memory vector index for a single document.
//!
//! A brute-force scan is plenty at this scale: one document yields tens to
//! a few thousand segments, and the index never outlives that document.

use super::types::{ScoredSegment, Segment};
use super::{RagError, Result};
use crate::provider::Normalization;

/// Immutable mapping from segment to vector, built once per ingestion.
///
/// All vectors share one dimension and the normalization convention of the
/// embedder that produced them. Replacing the document means building a new
/// index, never mutating this one.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    segments: Vec<Segment>,
    vectors: Vec<Vec<f32>>,
    /// Magnitudes, precomputed for unnormalized vectors
    norms: Vec<f32>,
    dimension: usize,
    normalization: Normalization,
}

impl VectorIndex {
    /// Builds an index from segments and their vectors (same order).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if the two sequences differ in
    /// length or the vectors differ in dimension.
    pub fn build(
        segments: Vec<Segment>,
        vectors: Vec<Vec<f32>>,
        normalization: Normalization,
    ) -> Result<Self> {
        if segments.len() != vectors.len() {
            return Err(RagError::DimensionMismatch {
                expected: segments.len(),
                actual: vectors.len(),
            });
        }

        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(RagError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }

        let norms = vectors.iter().map(|v| magnitude(v)).collect();

        Ok(Self {
            segments,
            vectors,
            norms,
            dimension,
            normalization,
        })
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the `fetch_k` segments most similar to `query`.
    ///
    /// Results are sorted by descending cosine similarity; equal scores are
    /// ordered by ascending segment id, so repeated searches return the same
    /// sequence. A score that is not finite ranks last.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if `query` has a different
    /// dimension than the indexed vectors.
    pub fn search(&self, query: &[f32], fetch_k: usize) -> Result<Vec<ScoredSegment>> {
        if self.is_empty() || fetch_k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let query_norm = magnitude(query);
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(slot, vector)| (slot, self.score(query, query_norm, slot, vector)))
            .map(|(slot, score)| (slot, if score.is_finite() { score } else { f32::NEG_INFINITY }))
            .collect();

        scored.sort_by(|(a_slot, a), (b_slot, b)| {
            b.total_cmp(a)
                .then_with(|| self.segments[*a_slot].id.cmp(&self.segments[*b_slot].id))
        });
        scored.truncate(fetch_k);

        Ok(scored
            .into_iter()
            .map(|(slot, score)| ScoredSegment {
                segment: self.segments[slot].clone(),
                score,
                slot,
            })
            .collect())
    }

    /// Cosine similarity between two indexed vectors.
    pub(crate) fn similarity_between(&self, a: usize, b: usize) -> f32 {
        match self.normalization {
            Normalization::UnitLength => dot(&self.vectors[a], &self.vectors[b]),
            Normalization::Unnormalized => {
                cosine(&self.vectors[a], &self.vectors[b], self.norms[a], self.norms[b])
            }
        }
    }

    fn score(&self, query: &[f32], query_norm: f32, slot: usize, vector: &[f32]) -> f32 {
        match self.normalization {
            Normalization::UnitLength => dot(query, vector),
            Normalization::Unnormalized => cosine(query, vector, query_norm, self.norms[slot]),
        }
    }
}

pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub(crate) fn magnitude(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Cosine similarity with precomputed magnitudes; zero vectors score 0.
pub(crate) fn cosine(a: &[f32], b: &[f32], norm_a: f32, norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}
