//! Inference engine clients for Coxswain.
//!
//! Currently one implementation: [`OllamaEngine`], a client for the native
//! Ollama HTTP API (`/api/chat` NDJSON streaming, `/api/tags`,
//! `/api/embeddings`). It implements both the [`InferenceEngine`] and
//! [`Embedder`] seams from `coxswain-core`.
//!
//! [`InferenceEngine`]: coxswain_core::InferenceEngine
//! [`Embedder`]: coxswain_core::Embedder

pub mod ollama;

pub use ollama::OllamaEngine;
