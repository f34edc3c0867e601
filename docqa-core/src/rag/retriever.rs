//! Segment selection with Maximal Marginal Relevance (MMR).
//!
//! Plain top-k tends to hand the model several near-identical chunks, since
//! overlapping windows of the same passage all score alike. MMR picks
//! greedily, each time taking the candidate that maximizes
//!
//! ```text
//! λ × relevance(c, query) − (1 − λ) × max(similarity(c, s) for s in selected)
//! ```
//!
//! λ = 1.0 is pure relevance, λ = 0.0 pure diversity.

use super::index::VectorIndex;
use super::types::{RetrievalRequest, ScoredSegment, Segment};
use super::{RagError, Result};
use crate::config::{RetrievalConfig, SearchType};
use tracing::debug;

/// Selection policy over a [`VectorIndex`].
#[derive(Debug, Clone, Copy)]
pub struct Retriever {
    search_type: SearchType,
    k: usize,
    fetch_k: usize,
    lambda: f32,
}

impl Default for Retriever {
    fn default() -> Self {
        Self {
            search_type: SearchType::Mmr,
            k: 3,
            fetch_k: 10,
            lambda: 0.5,
        }
    }
}

impl Retriever {
    /// Validates and creates an MMR retriever.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if `k` is zero, `k > fetch_k`, or
    /// `lambda` lies outside `[0, 1]`.
    pub fn mmr(k: usize, fetch_k: usize, lambda: f32) -> Result<Self> {
        Self::from_config(&RetrievalConfig {
            search_type: SearchType::Mmr,
            k,
            fetch_k,
            lambda,
        })
    }

    /// Plain top-`k` relevance ranking.
    pub fn similarity(k: usize) -> Result<Self> {
        Self::from_config(&RetrievalConfig {
            search_type: SearchType::Similarity,
            k,
            fetch_k: k,
            lambda: 1.0,
        })
    }

    pub fn from_config(config: &RetrievalConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| RagError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            search_type: config.search_type,
            k: config.k,
            fetch_k: config.fetch_k,
            lambda: config.lambda,
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn fetch_k(&self) -> usize {
        self.fetch_k
    }

    /// Selects up to `k` segments for `query_vector`, in selection order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyIndex`] for an index without segments, or
    /// [`RagError::DimensionMismatch`] if the query does not fit the index.
    pub fn select(&self, index: &VectorIndex, query_vector: &[f32]) -> Result<Vec<Segment>> {
        self.retrieve(
            index,
            &RetrievalRequest::new(query_vector.to_vec(), self.k, self.fetch_k),
        )
    }

    /// Runs one retrieval with explicit `k` / `fetch_k`.
    pub fn retrieve(&self, index: &VectorIndex, request: &RetrievalRequest) -> Result<Vec<Segment>> {
        if index.is_empty() {
            return Err(RagError::EmptyIndex);
        }
        if request.k == 0 || request.k > request.fetch_k {
            return Err(RagError::InvalidConfig(format!(
                "k ({}) must be between 1 and fetch_k ({})",
                request.k, request.fetch_k
            )));
        }

        let fetch_k = match self.search_type {
            SearchType::Mmr => request.fetch_k,
            SearchType::Similarity => request.k,
        };
        let candidates = index.search(&request.query_vector, fetch_k)?;
        debug!(
            candidates = candidates.len(),
            k = request.k,
            fetch_k,
            search_type = ?self.search_type,
            "Retrieved candidate pool"
        );

        let selected = match self.search_type {
            SearchType::Similarity => top_k(candidates, request.k),
            // Nothing to trade off when the pool is no larger than k.
            SearchType::Mmr if request.fetch_k <= request.k => top_k(candidates, request.k),
            SearchType::Mmr => mmr_select(index, candidates, request.k, self.lambda),
        };

        debug!(
            ids = ?selected.iter().map(|s| s.segment.id).collect::<Vec<_>>(),
            "Selected segments"
        );
        Ok(selected.into_iter().map(|s| s.segment).collect())
    }
}

fn top_k(mut candidates: Vec<ScoredSegment>, k: usize) -> Vec<ScoredSegment> {
    candidates.truncate(k);
    candidates
}

/// Greedy MMR over a relevance-ordered candidate pool.
///
/// Ties go to the candidate ranked earlier by relevance.
fn mmr_select(
    index: &VectorIndex,
    candidates: Vec<ScoredSegment>,
    k: usize,
    lambda: f32,
) -> Vec<ScoredSegment> {
    let k = k.min(candidates.len());
    let mut selected: Vec<ScoredSegment> = Vec::with_capacity(k);
    let mut remaining = candidates;

    while selected.len() < k && !remaining.is_empty() {
        let mut best_idx = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (idx, candidate) in remaining.iter().enumerate() {
            let redundancy = if selected.is_empty() {
                0.0
            } else {
                selected
                    .iter()
                    .map(|s| index.similarity_between(candidate.slot, s.slot))
                    .fold(f32::NEG_INFINITY, f32::max)
            };
            let score = lambda * candidate.score - (1.0 - lambda) * redundancy;

            // Strict comparison keeps the earlier candidate on ties.
            if score > best_score {
                best_score = score;
                best_idx = idx;
            }
        }

        selected.push(remaining.remove(best_idx));
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Normalization;

    fn normalize(v: Vec<f32>) -> Vec<f32> {
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.into_iter().map(|x| x / norm).collect()
    }

    fn index_from(vectors: Vec<Vec<f32>>) -> VectorIndex {
        let segments = (0..vectors.len())
            .map(|i| Segment::new(i, format!("segment {}", i), 0))
            .collect();
        let vectors = vectors.into_iter().map(normalize).collect();
        VectorIndex::build(segments, vectors, Normalization::UnitLength).unwrap()
    }

    /// Three near-identical vectors, one distinct but still relevant vector
    /// and one unrelated vector.
    fn duplicate_pool() -> VectorIndex {
        index_from(vec![
            vec![1.0, 0.0, 0.0],
            vec![0.99, 0.01, 0.0],
            vec![0.98, 0.02, 0.0],
            vec![0.6, 0.0, 0.8],
            vec![0.0, 1.0, 0.0],
        ])
    }

    /// Close to the duplicates, but not identical to any indexed vector.
    fn query() -> Vec<f32> {
        normalize(vec![1.0, 0.0, 0.3])
    }

    fn ids(segments: &[Segment]) -> Vec<usize> {
        segments.iter().map(|s| s.id).collect()
    }

    #[test]
    fn test_mmr_prefers_distinct_segment() {
        let index = duplicate_pool();
        let retriever = Retriever::mmr(2, 5, 0.5).unwrap();

        let selected = retriever.select(&index, &query()).unwrap();
        assert_eq!(ids(&selected), vec![0, 3]);
    }

    #[test]
    fn test_similarity_returns_duplicates() {
        let index = duplicate_pool();
        let retriever = Retriever::similarity(2).unwrap();

        let selected = retriever.select(&index, &query()).unwrap();
        assert_eq!(ids(&selected), vec![0, 1]);
    }

    #[test]
    fn test_lambda_one_is_pure_relevance() {
        let index = duplicate_pool();
        let retriever = Retriever::mmr(3, 5, 1.0).unwrap();
        let selected = retriever.select(&index, &query()).unwrap();
        assert_eq!(ids(&selected), vec![0, 1, 2]);
    }

    #[test]
    fn test_degenerates_to_top_k_when_fetch_k_equals_k() {
        let index = duplicate_pool();
        let retriever = Retriever::mmr(3, 3, 0.5).unwrap();

        let selected = retriever.select(&index, &query()).unwrap();
        let expected: Vec<usize> = index
            .search(&query(), 3)
            .unwrap()
            .iter()
            .map(|s| s.segment.id)
            .collect();
        assert_eq!(ids(&selected), expected);
    }

    #[test]
    fn test_returns_at_most_index_size() {
        let index = index_from(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let retriever = Retriever::default();
        assert_eq!(retriever.select(&index, &[1.0, 1.0]).unwrap().len(), 2);
    }

    #[test]
    fn test_default_selects_three_of_ten() {
        let vectors: Vec<Vec<f32>> = (0..12).map(|i| vec![1.0, i as f32 * 0.1, (i % 4) as f32]).collect();
        let index = index_from(vectors);
        let selected = Retriever::default().select(&index, &[1.0, 0.5, 0.5]).unwrap();

        assert_eq!(selected.len(), 3);
        let candidates: Vec<usize> = index
            .search(&[1.0, 0.5, 0.5], 10)
            .unwrap()
            .iter()
            .map(|s| s.segment.id)
            .collect();
        assert!(selected.iter().all(|s| candidates.contains(&s.id)));
    }

    #[test]
    fn test_ties_go_to_earlier_candidate() {
        let index = index_from(vec![vec![1.0, 0.0]; 4]);
        let selected = Retriever::mmr(2, 4, 0.5).unwrap().select(&index, &[1.0, 0.0]).unwrap();
        assert_eq!(ids(&selected), vec![0, 1]);
    }

    #[test]
    fn test_empty_index() {
        let index = VectorIndex::build(Vec::new(), Vec::new(), Normalization::UnitLength).unwrap();
        let err = Retriever::default().select(&index, &[1.0]).unwrap_err();
        assert!(matches!(err, RagError::EmptyIndex));
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(Retriever::mmr(0, 10, 0.5), Err(RagError::InvalidConfig(_))));
        assert!(matches!(Retriever::mmr(5, 4, 0.5), Err(RagError::InvalidConfig(_))));
        assert!(matches!(Retriever::mmr(3, 10, -0.1), Err(RagError::InvalidConfig(_))));
    }
}
