//! Ollama engine client.
//!
//! Talks to the native Ollama API:
//! - `POST /api/chat` — generation, streamed as newline-delimited JSON
//! - `GET /api/tags` — installed models
//! - `POST /api/embeddings` — embedding vectors for the retrieval index
//!
//! A mid-stream failure is delivered to the consumer as an `Err` item and
//! terminates the fragment sequence.

use async_trait::async_trait;
use coxswain_core::embed::Embedder;
use coxswain_core::engine::{GenerationRequest, InferenceEngine, ModelInfo, TokenFragment};
use coxswain_core::error::{EngineError, RetrievalError};
use coxswain_core::turn::{Role, Turn};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Client for an Ollama-compatible inference server.
pub struct OllamaEngine {
    base_url: String,
    client: reqwest::Client,
    embedding_model: Option<String>,
}

impl OllamaEngine {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Unavailable(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            embedding_model: None,
        })
    }

    /// Enable the `/api/embeddings` endpoint with the given model.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    fn to_api_messages(system: &str, turns: &[Turn]) -> Vec<ApiMessage> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        if !system.is_empty() {
            messages.push(ApiMessage {
                role: "system".into(),
                content: system.to_string(),
            });
        }
        for turn in turns {
            let (role, content) = match turn.role {
                Role::User => ("user", turn.content.clone()),
                Role::Assistant => ("assistant", turn.content.clone()),
                Role::System => ("system", turn.content.clone()),
                // Ollama chat has no first-class tool role for plain chat;
                // tool output rides along as a user message.
                Role::Tool => ("user", format!("[Tool Result] {}", turn.content)),
            };
            messages.push(ApiMessage {
                role: role.into(),
                content,
            });
        }
        messages
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ApiMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ApiMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

#[async_trait]
impl InferenceEngine for OllamaEngine {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<TokenFragment, EngineError>>,
        EngineError,
    > {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: request.model.clone(),
            messages: Self::to_api_messages(&request.system, &request.turns),
            stream: true,
        };

        debug!(model = %request.model, messages = body.messages.len(), "Sending chat request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_send_err)?;

        let status = response.status().as_u16();
        if status == 404 {
            return Err(EngineError::ModelNotFound(request.model));
        }
        if status != 200 {
            let message = response.text().await.unwrap_or_default();
            warn!(status, body = %message, "Engine returned error");
            return Err(EngineError::ApiError {
                status_code: status,
                message,
            });
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(EngineError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&bytes));

                // NDJSON: one JSON object per line.
                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer = buffer[line_end + 1..].to_string();
                    if line.is_empty() {
                        continue;
                    }

                    let chunk: ChatChunk = match serde_json::from_str(&line) {
                        Ok(c) => c,
                        Err(e) => {
                            let _ = tx
                                .send(Err(EngineError::StreamInterrupted(format!(
                                    "Malformed stream chunk: {e}"
                                ))))
                                .await;
                            return;
                        }
                    };

                    if let Some(error) = chunk.error {
                        let _ = tx.send(Err(EngineError::StreamInterrupted(error))).await;
                        return;
                    }

                    if let Some(message) = chunk.message
                        && !message.content.is_empty()
                        && tx.send(Ok(TokenFragment::text(message.content))).await.is_err()
                    {
                        // Consumer hung up (cancellation). Stop reading.
                        return;
                    }

                    if chunk.done {
                        let _ = tx.send(Ok(TokenFragment::end())).await;
                        return;
                    }
                }
            }

            // Stream ended without a done marker.
            let _ = tx
                .send(Err(EngineError::StreamInterrupted(
                    "Stream closed before completion".into(),
                )))
                .await;
        });

        Ok(rx)
    }

    async fn list_models(&self) -> std::result::Result<Vec<ModelInfo>, EngineError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await.map_err(map_send_err)?;

        let status = response.status().as_u16();
        if status != 200 {
            let message = response.text().await.unwrap_or_default();
            return Err(EngineError::ApiError {
                status_code: status,
                message,
            });
        }

        let tags: TagsResponse = response.json().await.map_err(|e| EngineError::ApiError {
            status_code: 200,
            message: format!("Failed to parse tags response: {e}"),
        })?;
        Ok(tags.models)
    }

    async fn health_check(&self) -> std::result::Result<bool, EngineError> {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEngine {
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, RetrievalError> {
        let Some(model) = &self.embedding_model else {
            return Err(RetrievalError::EmbeddingFailed(
                "No embedding model configured".into(),
            ));
        };

        let url = format!("{}/api/embeddings", self.base_url);
        let body = serde_json::json!({ "model": model, "prompt": text });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrievalError::EmbeddingFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RetrievalError::EmbeddingFailed(format!(
                "Embedding request failed with status {}",
                response.status()
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::EmbeddingFailed(e.to_string()))?;

        if parsed.embedding.is_empty() {
            return Err(RetrievalError::EmbeddingFailed(
                "Engine returned an empty embedding".into(),
            ));
        }
        Ok(parsed.embedding)
    }
}

fn map_send_err(e: reqwest::Error) -> EngineError {
    if e.is_timeout() {
        EngineError::Timeout(e.to_string())
    } else {
        EngineError::Unavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_message_leads_when_present() {
        let messages = OllamaEngine::to_api_messages("be brief", &[Turn::user("hi")]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
    }

    #[test]
    fn no_system_message_when_empty() {
        let messages = OllamaEngine::to_api_messages("", &[Turn::user("hi")]);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
    }

    #[test]
    fn tool_turns_ride_as_user_messages() {
        let messages =
            OllamaEngine::to_api_messages("", &[Turn::tool("weather", "Sunny, 21°C")]);
        assert_eq!(messages[0].role, "user");
        assert!(messages[0].content.starts_with("[Tool Result]"));
    }

    #[test]
    fn chat_chunk_parses_content() {
        let chunk: ChatChunk =
            serde_json::from_str(r#"{"message":{"role":"assistant","content":"Hel"},"done":false}"#)
                .unwrap();
        assert_eq!(chunk.message.unwrap().content, "Hel");
        assert!(!chunk.done);
    }

    #[test]
    fn chat_chunk_parses_done_marker() {
        let chunk: ChatChunk =
            serde_json::from_str(r#"{"done":true,"total_duration":12345}"#).unwrap();
        assert!(chunk.done);
        assert!(chunk.message.is_none());
    }

    #[test]
    fn chat_chunk_parses_error() {
        let chunk: ChatChunk = serde_json::from_str(r#"{"error":"model exploded"}"#).unwrap();
        assert_eq!(chunk.error.as_deref(), Some("model exploded"));
    }

    #[test]
    fn tags_response_parses() {
        let tags: TagsResponse = serde_json::from_str(
            r#"{"models":[{"name":"llama3:latest","size":4000000000,"digest":"abc"}]}"#,
        )
        .unwrap();
        assert_eq!(tags.models.len(), 1);
        assert_eq!(tags.models[0].name, "llama3:latest");
    }

    #[test]
    fn base_url_trailing_slash_is_stripped() {
        let engine =
            OllamaEngine::new("http://localhost:11434/", Duration::from_secs(5)).unwrap();
        assert_eq!(engine.base_url, "http://localhost:11434");
    }
}
