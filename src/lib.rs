//! docqa - Ask questions about a document
//!
//! This is the convenience wrapper crate that re-exports the docqa core.
//!
//! # Quick Start
//!
//! ```toml
//! [dependencies]
//! docqa = "0.1"
//! ```
//!
//! ```no_run
//! use docqa::prelude::*;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::from_config(&Config::load_or_default()?)?;
//! pipeline.ingest(&std::fs::read("paper.pdf").unwrap()).await?;
//! println!("{}", pipeline.ask("What is the main result?").await?);
//! # Ok(())
//! # }
//! ```

// Re-export core
pub use docqa_core::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use docqa_core::provider::{CompletionProvider, EmbeddingProvider};
    pub use docqa_core::{Config, IngestReport, Pipeline, RagError, Segment};
}
