//! Embedder trait — the abstraction over the embedding backend.
//!
//! The retrieval index stores one vector per chunk and embeds queries at
//! lookup time. When no embedder is configured the index falls back to a
//! lexical similarity measure, so this seam is optional end to end.

use crate::error::RetrievalError;
use async_trait::async_trait;

/// Produces a fixed-dimension vector for a piece of text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one text. All vectors from one embedder share a dimension.
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, RetrievalError>;
}
