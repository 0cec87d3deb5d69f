//! The per-session retrieval index.
//!
//! Chunks are stored in ingestion order per session. Scoring is cosine
//! similarity over embeddings when an embedder is configured; without one
//! (or when embedding fails) the index degrades to a lexical overlap
//! measure instead of failing the query.

use crate::chunker::{ChunkParams, chunk_text};
use coxswain_core::embed::Embedder;
use coxswain_core::error::RetrievalError;
use coxswain_core::turn::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;
use tracing::{debug, warn};

/// One indexed chunk of an ingested document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub chunk_id: String,
    pub session_id: SessionId,
    pub text: String,
    /// Absent when the index runs without an embedder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub source_name: String,
    /// Position in session ingestion order. Ties in score resolve to the
    /// lower `seq`.
    pub seq: usize,
}

/// A chunk paired with its similarity to a query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f32,
}

/// Index-wide settings.
#[derive(Debug, Clone)]
pub struct RetrievalParams {
    pub chunk: ChunkParams,
    pub top_k: usize,
    /// Similarity floor; chunks scoring below it are never returned.
    pub min_score: f32,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            chunk: ChunkParams::default(),
            top_k: 3,
            min_score: 0.2,
        }
    }
}

/// Session-scoped chunk store with top-k similarity lookup.
pub struct RetrievalIndex {
    params: RetrievalParams,
    embedder: Option<Arc<dyn Embedder>>,
    sessions: RwLock<HashMap<SessionId, Vec<DocumentChunk>>>,
}

impl RetrievalIndex {
    pub fn new(params: RetrievalParams) -> Self {
        Self {
            params,
            embedder: None,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_embedder(params: RetrievalParams, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            params,
            embedder: Some(embedder),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Chunk and index a document under a session. Returns the number of
    /// chunks stored. Blank documents (or documents that yield no chunks
    /// above the minimum length) are rejected.
    pub async fn ingest(
        &self,
        session_id: &SessionId,
        source_name: &str,
        text: &str,
    ) -> Result<usize, RetrievalError> {
        let pieces = chunk_text(text, &self.params.chunk);
        if pieces.is_empty() {
            return Err(RetrievalError::EmptyDocument {
                source_name: source_name.to_string(),
            });
        }

        let added = pieces.len();
        let mut sessions = self.sessions.write().await;
        let entry = sessions.entry(session_id.clone()).or_default();
        let mut seq = entry.len();
        for text in pieces {
            let embedding = self.embed_or_none(&text).await;
            entry.push(DocumentChunk {
                chunk_id: Uuid::new_v4().to_string(),
                session_id: session_id.clone(),
                text,
                embedding,
                source_name: source_name.to_string(),
                seq,
            });
            seq += 1;
        }
        debug!(session_id = %session_id, source = source_name, added, "Document ingested");
        Ok(added)
    }

    /// Top-k chunks most similar to `query`, highest score first. Equal
    /// scores keep ingestion order. Unknown sessions and sessions with no
    /// documents return an empty vec.
    pub async fn query(&self, session_id: &SessionId, query: &str) -> Vec<ScoredChunk> {
        let sessions = self.sessions.read().await;
        let Some(chunks) = sessions.get(session_id) else {
            return Vec::new();
        };

        let query_embedding = self.embed_or_none(query).await;

        let mut scored: Vec<ScoredChunk> = chunks
            .iter()
            .map(|chunk| {
                let score = match (&query_embedding, &chunk.embedding) {
                    (Some(q), Some(c)) => cosine_similarity(q, c),
                    _ => lexical_overlap(query, &chunk.text),
                };
                ScoredChunk {
                    chunk: chunk.clone(),
                    score,
                }
            })
            .filter(|s| s.score >= self.params.min_score)
            .collect();

        // Stable sort: equal scores keep ingestion order.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.params.top_k);
        scored
    }

    /// Number of chunks indexed for a session.
    pub async fn chunk_count(&self, session_id: &SessionId) -> usize {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map_or(0, Vec::len)
    }

    /// Drop everything indexed for a session. No-op for unknown ids.
    pub async fn remove_session(&self, session_id: &SessionId) {
        self.sessions.write().await.remove(session_id);
    }

    async fn embed_or_none(&self, text: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(text).await {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(error = %e, "Embedding failed, falling back to lexical scoring");
                None
            }
        }
    }
}

/// Cosine similarity of two vectors. Zero for mismatched dims or zero norms.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Fraction of distinct query words present in the chunk, case-folded.
fn lexical_overlap(query: &str, chunk: &str) -> f32 {
    let query_words: HashSet<String> = words_of(query);
    if query_words.is_empty() {
        return 0.0;
    }
    let chunk_words: HashSet<String> = words_of(chunk);
    let hits = query_words.intersection(&chunk_words).count();
    hits as f32 / query_words.len() as f32
}

fn words_of(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn test_params() -> RetrievalParams {
        RetrievalParams {
            chunk: ChunkParams {
                chunk_len: 100,
                chunk_overlap: 10,
                min_chunk_len: 5,
            },
            top_k: 2,
            min_score: 0.2,
        }
    }

    #[tokio::test]
    async fn ingest_blank_document_rejected() {
        let index = RetrievalIndex::new(test_params());
        let err = index
            .ingest(&SessionId::from("s1"), "notes.txt", "   \n  ")
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::EmptyDocument { .. }));
    }

    #[tokio::test]
    async fn query_unknown_session_is_empty() {
        let index = RetrievalIndex::new(test_params());
        assert!(index.query(&SessionId::from("ghost"), "anything").await.is_empty());
    }

    #[tokio::test]
    async fn lexical_query_ranks_by_overlap() {
        let index = RetrievalIndex::new(test_params());
        let sid = SessionId::from("s1");
        index
            .ingest(&sid, "a.txt", "rust ownership and borrowing rules")
            .await
            .unwrap();
        index
            .ingest(&sid, "b.txt", "gardening tips for tomato plants")
            .await
            .unwrap();

        let hits = index.query(&sid, "rust borrowing").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.source_name, "a.txt");
        assert!(hits[0].score > 0.9);
    }

    #[tokio::test]
    async fn min_score_filters_weak_matches() {
        let index = RetrievalIndex::new(RetrievalParams {
            min_score: 0.6,
            ..test_params()
        });
        let sid = SessionId::from("s1");
        index
            .ingest(&sid, "a.txt", "rust ownership model explained here")
            .await
            .unwrap();

        // Only 1 of 3 query words matches: score ~0.33, below 0.6.
        let hits = index.query(&sid, "rust cooking recipes").await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn ties_keep_ingestion_order() {
        let index = RetrievalIndex::new(test_params());
        let sid = SessionId::from("s1");
        index.ingest(&sid, "first.txt", "shared keyword alpha beta").await.unwrap();
        index.ingest(&sid, "second.txt", "shared keyword gamma delta").await.unwrap();

        let hits = index.query(&sid, "shared keyword").await;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.source_name, "first.txt");
        assert_eq!(hits[1].chunk.source_name, "second.txt");
    }

    #[tokio::test]
    async fn top_k_caps_results() {
        let index = RetrievalIndex::new(test_params());
        let sid = SessionId::from("s1");
        for i in 0..5 {
            index
                .ingest(&sid, &format!("doc{i}.txt"), "keyword rich text body here")
                .await
                .unwrap();
        }
        let hits = index.query(&sid, "keyword text").await;
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let index = RetrievalIndex::new(test_params());
        let a = SessionId::from("a");
        let b = SessionId::from("b");
        index.ingest(&a, "a.txt", "private notes about sailing").await.unwrap();

        assert!(index.query(&b, "sailing notes").await.is_empty());
        assert_eq!(index.chunk_count(&a).await, 1);
        assert_eq!(index.chunk_count(&b).await, 0);
    }

    #[tokio::test]
    async fn remove_session_drops_chunks() {
        let index = RetrievalIndex::new(test_params());
        let sid = SessionId::from("s1");
        index.ingest(&sid, "a.txt", "some indexed content here").await.unwrap();
        index.remove_session(&sid).await;
        assert_eq!(index.chunk_count(&sid).await, 0);
    }

    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
            // Two-axis toy embedding: presence of "ocean" vs "desert".
            let lower = text.to_lowercase();
            Ok(vec![
                if lower.contains("ocean") { 1.0 } else { 0.0 },
                if lower.contains("desert") { 1.0 } else { 0.0 },
            ])
        }
    }

    #[tokio::test]
    async fn embedded_query_uses_cosine() {
        let index = RetrievalIndex::with_embedder(test_params(), Arc::new(KeywordEmbedder));
        let sid = SessionId::from("s1");
        index.ingest(&sid, "sea.txt", "the ocean currents run deep").await.unwrap();
        index.ingest(&sid, "sand.txt", "the desert stretches for miles").await.unwrap();

        let hits = index.query(&sid, "tell me about the ocean").await;
        assert_eq!(hits[0].chunk.source_name, "sea.txt");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_handles_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
