//! Text extraction from uploaded documents.
//!
//! PDFs are recognized by their `%PDF` magic bytes and run through
//! `pdf-extract`; anything else must be UTF-8 text.

use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while turning document bytes into text.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to extract PDF text: {0}")]
    Pdf(String),

    #[error("Document is neither a PDF nor UTF-8 text")]
    NotText,

    #[error("Document contains no extractable text")]
    Empty,
}

/// Detected document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    PlainText,
}

impl DocumentFormat {
    pub fn detect(bytes: &[u8]) -> Self {
        // Some writers put a few junk bytes before the header.
        let head = &bytes[..bytes.len().min(1024)];
        if head.windows(5).any(|w| w == b"%PDF-") {
            Self::Pdf
        } else {
            Self::PlainText
        }
    }
}

/// Extracts the text of a document.
///
/// CPU-bound for PDFs; callers on an async runtime should run it on a
/// blocking thread.
///
/// # Errors
///
/// Returns [`ParseError::Empty`] when the document has no non-whitespace
/// text, so a scanned PDF without a text layer is rejected up front.
pub fn extract_text(bytes: &[u8]) -> Result<String, ParseError> {
    let format = DocumentFormat::detect(bytes);
    debug!(?format, bytes = bytes.len(), "Extracting document text");

    let text = match format {
        DocumentFormat::Pdf => extract_pdf(bytes)?,
        DocumentFormat::PlainText => {
            let text = std::str::from_utf8(bytes).map_err(|_| ParseError::NotText)?;
            text.strip_prefix('\u{feff}').unwrap_or(text).to_string()
        }
    };

    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(text)
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ParseError> {
    // pdf-extract panics on some malformed files instead of returning an error.
    match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes))) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ParseError::Pdf(format!("{:?}", e))),
        Err(_) => Err(ParseError::Pdf("PDF parser panicked on malformed input".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(DocumentFormat::detect(b"%PDF-1.7\n..."), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::detect(b"\r\n%PDF-1.4"), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::detect(b"plain words"), DocumentFormat::PlainText);
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(extract_text("안녕하세요 world".as_bytes()).unwrap(), "안녕하세요 world");
    }

    #[test]
    fn test_bom_is_stripped() {
        assert_eq!(extract_text("\u{feff}hello".as_bytes()).unwrap(), "hello");
    }

    #[test]
    fn test_binary_is_rejected() {
        assert!(matches!(extract_text(&[0xff, 0xfe, 0x00, 0x81]), Err(ParseError::NotText)));
    }

    #[test]
    fn test_blank_is_rejected() {
        assert!(matches!(extract_text(b"  \n\t "), Err(ParseError::Empty)));
        assert!(matches!(extract_text(b""), Err(ParseError::Empty)));
    }

    #[test]
    fn test_broken_pdf_is_an_error() {
        assert!(matches!(extract_text(b"%PDF-1.4\nnot really a pdf"), Err(ParseError::Pdf(_))));
    }
}
