//! InferenceEngine trait — the abstraction over the token-generation backend.
//!
//! An engine knows how to take an assembled prompt context and produce a
//! lazy, finite sequence of text fragments terminated by an end-of-stream
//! marker. Implementations: the Ollama HTTP client, mocks in tests.

use crate::error::EngineError;
use crate::turn::Turn;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One generation request: the assembled context plus the target model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The model to use (e.g. "llama3", "qwen2:1.5b").
    pub model: String,

    /// System message (system prompt + injected context sections).
    pub system: String,

    /// Conversation turns: history window + current user message, in order.
    pub turns: Vec<Turn>,

    /// Whether the caller wants incremental fragments.
    #[serde(default)]
    pub stream: bool,
}

/// A single fragment of a streamed generation.
///
/// The sequence is finite and ordered; the fragment with `done == true` is
/// the end-of-stream marker and carries no further content after it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenFragment {
    /// Partial content delta.
    #[serde(default)]
    pub content: String,

    /// Whether this is the final fragment.
    #[serde(default)]
    pub done: bool,
}

impl TokenFragment {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            done: false,
        }
    }

    pub fn end() -> Self {
        Self {
            content: String::new(),
            done: true,
        }
    }
}

/// Metadata about an installed model, as reported by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// The core inference engine trait.
///
/// The orchestrator calls `generate()` without knowing which engine is
/// behind it. The returned receiver yields ordered fragments and closes
/// after the end-of-stream marker; a mid-stream failure is delivered as an
/// `Err` item and terminates the sequence.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// A human-readable name for this engine (e.g. "ollama").
    fn name(&self) -> &str;

    /// Submit a request and receive a lazy sequence of fragments.
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<TokenFragment, EngineError>>,
        EngineError,
    >;

    /// List installed models.
    async fn list_models(&self) -> std::result::Result<Vec<ModelInfo>, EngineError>;

    /// Whether a model is installed. Matches exact names or name prefixes
    /// (so "llama3" matches "llama3:latest").
    async fn model_exists(&self, model: &str) -> std::result::Result<bool, EngineError> {
        let models = self.list_models().await?;
        Ok(models
            .iter()
            .any(|m| m.name == model || m.name.starts_with(model)))
    }

    /// Health check — can we reach the engine?
    async fn health_check(&self) -> std::result::Result<bool, EngineError> {
        Ok(true)
    }
}
