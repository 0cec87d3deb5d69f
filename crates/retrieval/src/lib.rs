//! Session-scoped document retrieval for Coxswain.
//!
//! Documents are split into overlapping fixed-size chunks
//! ([`chunker`]) and held per session in the [`RetrievalIndex`]. Queries
//! return the top-k most similar chunks above a similarity floor, via
//! embedding cosine similarity when an [`Embedder`] is configured and a
//! lexical overlap measure when one is not.
//!
//! [`Embedder`]: coxswain_core::Embedder

pub mod chunker;
pub mod index;

pub use chunker::{ChunkParams, chunk_text};
pub use index::{DocumentChunk, RetrievalIndex, RetrievalParams, ScoredChunk};
