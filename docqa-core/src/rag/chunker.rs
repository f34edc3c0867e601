//! Text chunking for RAG.
//!
//! Splits extracted document text into overlapping fixed-size windows.

use super::types::Segment;
use super::{RagError, Result};
use tracing::debug;

/// Chunking parameters, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            size: 500,
            overlap: 50,
        }
    }
}

impl Chunker {
    /// Validates and creates a chunker.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if `size` is zero or `overlap` is
    /// not smaller than `size`.
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            return Err(RagError::InvalidConfig("chunk size must be positive".to_string()));
        }
        if overlap >= size {
            return Err(RagError::InvalidConfig(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, size
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Splits text into overlapping segments.
    ///
    /// Windows are `size` characters long and start every `size - overlap`
    /// characters, so adjacent segments share exactly `overlap` characters.
    /// The last segment may be shorter; splitting stops as soon as a window
    /// reaches the end of the text.
    ///
    /// # UTF-8 Safety
    ///
    /// Sizes count `char`s, not bytes, so multi-byte characters are never
    /// split.
    pub fn chunk(&self, text: &str) -> Vec<Segment> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, including the end of the text.
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = boundaries.len() - 1;
        let step = self.size - self.overlap;

        let mut segments = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.size).min(char_count);
            let piece = &text[boundaries[start]..boundaries[end]];
            segments.push(Segment::new(segments.len(), piece, start));

            if end == char_count {
                break;
            }
            start += step;
        }

        debug!(
            chars = char_count,
            segments = segments.len(),
            size = self.size,
            overlap = self.overlap,
            "Chunked document text"
        );
        segments
    }
}

/// Splits `text` with a one-off chunker.
pub fn chunk(text: &str, size: usize, overlap: usize) -> Result<Vec<Segment>> {
    Ok(Chunker::new(size, overlap)?.chunk(text))
}
