/// A contiguous window of document text.
///
/// Segments are the unit of retrieval. Each one is created by the chunker,
/// embedded once, and owned by the [`VectorIndex`](super::VectorIndex) built
/// from it.
///
/// # Example
///
/// ```
/// # use docqa_core::rag::Segment;
/// let segment = Segment::new(0, "Hello world", 0);
/// assert_eq!(segment.char_len(), 11);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// 0-based position in chunk order
    pub id: usize,
    pub text: String,
    /// Character offset of the first character in the source text
    pub source_offset: usize,
}

impl Segment {
    pub fn new(id: usize, text: impl Into<String>, source_offset: usize) -> Self {
        Self {
            id,
            text: text.into(),
            source_offset,
        }
    }

    /// Length in characters, the unit the chunker works in.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A segment together with its similarity to a query.
///
/// Returned by [`VectorIndex::search`](super::VectorIndex::search), ordered
/// by descending score.
///
/// # Score Range
///
/// Cosine similarity, so `-1.0..=1.0`:
/// - `1.0` - same direction as the query
/// - `0.0` - orthogonal (or a zero vector on either side)
/// - `-1.0` - opposite direction
#[derive(Debug, Clone)]
pub struct ScoredSegment {
    pub segment: Segment,
    pub score: f32,
    /// Position of the segment's vector inside the index
    pub(crate) slot: usize,
}

/// Parameters of one retrieval.
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub query_vector: Vec<f32>,
    /// Segments to return
    pub k: usize,
    /// Candidates pulled from the index before selection
    pub fetch_k: usize,
}

impl RetrievalRequest {
    pub fn new(query_vector: Vec<f32>, k: usize, fetch_k: usize) -> Self {
        Self {
            query_vector,
            k,
            fetch_k,
        }
    }
}
