//! The currently loaded document.

use super::index::VectorIndex;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A fully indexed document ready for questions.
#[derive(Debug)]
pub struct ActiveDocument {
    /// Display name, usually the uploaded file name
    pub name: String,
    /// SHA-256 of the document bytes, hex encoded
    pub fingerprint: String,
    pub index: VectorIndex,
}

/// Holds at most one [`ActiveDocument`].
///
/// Readers clone the `Arc` and release the lock immediately, so a question
/// keeps working against the document it started with even if another one is
/// swapped in meanwhile. Writers only ever swap complete documents.
#[derive(Debug, Default)]
pub struct DocumentContext {
    active: RwLock<Option<Arc<ActiveDocument>>>,
}

impl DocumentContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the active document, if any.
    pub async fn current(&self) -> Option<Arc<ActiveDocument>> {
        self.active.read().await.clone()
    }

    /// Makes `document` active, returning the one it replaced.
    pub async fn replace(&self, document: ActiveDocument) -> Option<Arc<ActiveDocument>> {
        self.active.write().await.replace(Arc::new(document))
    }

    /// Drops the active document, returning it.
    pub async fn clear(&self) -> Option<Arc<ActiveDocument>> {
        self.active.write().await.take()
    }

    pub async fn is_empty(&self) -> bool {
        self.active.read().await.is_none()
    }
}
