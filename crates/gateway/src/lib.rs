//! HTTP API gateway for Coxswain.
//!
//! Exposes REST endpoints for session management, document ingestion,
//! chat turns (JSON and SSE streaming), model listing, and direct tool
//! invocation. Built on Axum.
//!
//! The gateway is a thin shell: every route delegates to the
//! orchestrator and translates its errors into HTTP status codes. No
//! turn logic lives here.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, Sse},
    response::Json,
    routing::{delete, get, post},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::CorsLayer;
use tracing::info;

use coxswain_config::AppConfig;
use coxswain_core::engine::ModelInfo;
use coxswain_core::error::{EngineError, Error, ToolError};
use coxswain_core::tool::{ToolInvocation, ToolRoute};
use coxswain_core::turn::{ChatTurnRequest, SessionId, Turn};
use coxswain_engine::OllamaEngine;
use coxswain_memory::{MemoryLimits, MemoryStore, SessionInfo};
use coxswain_orchestrator::{
    AssemblyMetadata, Budget, BudgetUnit, BusyPolicy, ContextAssembler, Orchestrator,
    OrchestratorSettings,
};
use coxswain_retrieval::{ChunkParams, RetrievalIndex, RetrievalParams};
use coxswain_tools::default_toolset;

/// Shared application state for the gateway.
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub config: AppConfig,
}

type SharedState = Arc<AppState>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Translate an orchestrator error into an HTTP response.
fn into_api_error(err: Error) -> ApiError {
    let status = match &err {
        Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
        Error::SessionBusy(_) => StatusCode::CONFLICT,
        Error::EmptyDocument { .. } => StatusCode::BAD_REQUEST,
        Error::InferenceUnavailable(EngineError::ModelNotFound(_)) => StatusCode::NOT_FOUND,
        Error::InferenceUnavailable(_) => StatusCode::BAD_GATEWAY,
        Error::Tool(ToolError::NotFound(_)) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/models", get(models_handler))
        .route("/api/sessions", post(open_session_handler))
        .route("/api/sessions", get(list_sessions_handler))
        .route("/api/sessions/{id}", get(session_info_handler))
        .route("/api/sessions/{id}", delete(close_session_handler))
        .route("/api/sessions/{id}/history", get(history_handler))
        .route("/api/sessions/{id}/clear", post(clear_session_handler))
        .route("/api/documents", post(ingest_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/stream", post(chat_stream_handler))
        .route("/api/tools/{name}", post(tool_handler))
        // Document uploads are the largest payloads; 2 MB covers them.
        .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the orchestrator and its subsystems from configuration.
///
/// The engine is constructed once and shared: it serves both generation
/// and, when an embedding model is configured, the retrieval index's
/// embedder.
pub fn build_orchestrator(config: &AppConfig) -> Result<Orchestrator, Box<dyn std::error::Error>> {
    let mut engine = OllamaEngine::new(
        &config.engine.base_url,
        Duration::from_secs(config.engine.request_timeout_secs),
    )?;
    if let Some(model) = &config.engine.embedding_model {
        engine = engine.with_embedding_model(model.clone());
    }
    let engine = Arc::new(engine);

    let memory = Arc::new(MemoryStore::new(MemoryLimits {
        max_turns: config.memory.max_turns,
        max_chars: config.memory.max_chars,
        retain_turns: config.memory.retain_turns,
    }));

    let params = RetrievalParams {
        chunk: ChunkParams {
            chunk_len: config.retrieval.chunk_len,
            chunk_overlap: config.retrieval.chunk_overlap,
            min_chunk_len: config.retrieval.min_chunk_len,
        },
        top_k: config.retrieval.top_k,
        min_score: config.retrieval.min_score,
    };
    let index = if config.engine.embedding_model.is_some() {
        Arc::new(RetrievalIndex::with_embedder(params, engine.clone()))
    } else {
        Arc::new(RetrievalIndex::new(params))
    };

    let tools = Arc::new(default_toolset(Duration::from_millis(
        config.tools.timeout_ms,
    )));

    let unit = BudgetUnit::parse(&config.assembler.unit)
        .ok_or("assembler.unit must be \"chars\" or \"tokens\"")?;
    let assembler = ContextAssembler::new(Budget::new(config.assembler.budget, unit));

    let settings = OrchestratorSettings {
        busy_policy: BusyPolicy::parse(&config.orchestrator.busy_policy)
            .ok_or("orchestrator.busy_policy must be \"wait\" or \"reject\"")?,
        log_tool_turns: config.orchestrator.log_tool_turns,
    };

    Ok(Orchestrator::new(
        engine, memory, index, tools, assembler, settings,
    ))
}

/// Start the gateway HTTP server. Runs until the process is stopped.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = Arc::new(build_orchestrator(&config)?);
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = Arc::new(AppState {
        orchestrator,
        config,
    });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ── Health & models ───────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Whether the inference engine answered a probe.
    pub engine: bool,
}

/// `GET /health` — liveness plus an engine reachability probe.
async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let engine = state
        .orchestrator
        .engine()
        .health_check()
        .await
        .unwrap_or(false);
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine,
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
}

/// `GET /api/models` — models installed on the engine.
async fn models_handler(
    State(state): State<SharedState>,
) -> Result<Json<ModelsResponse>, ApiError> {
    let models = state
        .orchestrator
        .engine()
        .list_models()
        .await
        .map_err(|e| into_api_error(Error::InferenceUnavailable(e)))?;
    Ok(Json(ModelsResponse { models }))
}

// ── Sessions ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenSessionRequest {
    pub model: String,
    #[serde(default)]
    pub system_prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenSessionResponse {
    pub session_id: SessionId,
    pub model: String,
}

/// `POST /api/sessions` — open a session. 404 when the model is not installed.
async fn open_session_handler(
    State(state): State<SharedState>,
    Json(payload): Json<OpenSessionRequest>,
) -> Result<(StatusCode, Json<OpenSessionResponse>), ApiError> {
    let session_id = state
        .orchestrator
        .open_session(&payload.model, &payload.system_prompt)
        .await
        .map_err(into_api_error)?;
    info!(session_id = %session_id, model = %payload.model, "Session opened");
    Ok((
        StatusCode::CREATED,
        Json(OpenSessionResponse {
            session_id,
            model: payload.model,
        }),
    ))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionInfo>,
}

/// `GET /api/sessions` — all live sessions, oldest first.
async fn list_sessions_handler(State(state): State<SharedState>) -> Json<SessionsResponse> {
    let sessions = state.orchestrator.memory().sessions().await;
    Json(SessionsResponse { sessions })
}

/// `GET /api/sessions/{id}` — summary of one session.
async fn session_info_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionInfo>, ApiError> {
    let info = state
        .orchestrator
        .memory()
        .session_info(&SessionId(id))
        .await
        .map_err(|e| into_api_error(e.into()))?;
    Ok(Json(info))
}

/// `DELETE /api/sessions/{id}` — close a session and drop its index.
async fn close_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> StatusCode {
    if state.orchestrator.close_session(&SessionId(id)).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub max_turns: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: SessionId,
    pub turns: Vec<Turn>,
}

/// `GET /api/sessions/{id}/history` — the conversation log, oldest first.
async fn history_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let session_id = SessionId(id);
    let turns = state
        .orchestrator
        .memory()
        .history(&session_id, query.max_turns)
        .await
        .map_err(|e| into_api_error(e.into()))?;
    Ok(Json(HistoryResponse { session_id, turns }))
}

/// `POST /api/sessions/{id}/clear` — empty the log but keep the session.
async fn clear_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .orchestrator
        .memory()
        .clear(&SessionId(id))
        .await
        .map_err(|e| into_api_error(e.into()))?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Documents ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestRequest {
    pub session_id: SessionId,
    pub source_name: String,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub session_id: SessionId,
    pub chunks_indexed: usize,
}

/// `POST /api/documents` — chunk and index a document into a session.
async fn ingest_handler(
    State(state): State<SharedState>,
    Json(payload): Json<IngestRequest>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    let session_id = payload.session_id;
    let chunks_indexed = state
        .orchestrator
        .ingest_document(&session_id, &payload.source_name, &payload.text)
        .await
        .map_err(into_api_error)?;
    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            session_id,
            chunks_indexed,
        }),
    ))
}

// ── Chat ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: SessionId,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_invocation: Option<ToolInvocation>,
    pub assembly: AssemblyMetadata,
}

/// `POST /api/chat` — run a turn to completion, return the full response.
async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatTurnRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let reply = state
        .orchestrator
        .run_turn(payload)
        .await
        .map_err(into_api_error)?;
    Ok(Json(ChatResponse {
        session_id: reply.session_id,
        response: reply.response,
        tool_invocation: reply.tool_invocation,
        assembly: reply.assembly,
    }))
}

/// `POST /api/chat/stream` — run a turn, streaming events over SSE.
///
/// Pre-generation failures (unknown session, busy session, unreachable
/// engine) come back as plain HTTP errors; anything after the stream
/// opens arrives as an `error` event. Closing the connection cancels
/// the turn.
async fn chat_stream_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatTurnRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let rx = state
        .orchestrator
        .stream_turn(payload)
        .await
        .map_err(into_api_error)?;

    let stream = ReceiverStream::new(rx).map(|event| {
        let name = event.event_type();
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(SseEvent::default().event(name).data(data))
    });
    Ok(Sse::new(stream))
}

// ── Tools ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolRequest {
    pub query: String,
}

/// `POST /api/tools/{name}` — invoke one tool directly, bypassing the router.
async fn tool_handler(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Json(payload): Json<ToolRequest>,
) -> Result<Json<ToolInvocation>, ApiError> {
    let Some(route) = ToolRoute::parse(&name) else {
        return Err(into_api_error(Error::Tool(ToolError::NotFound(name))));
    };
    let invocation = state.orchestrator.tools().invoke(route, &payload.query).await;
    Ok(Json(invocation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use coxswain_core::engine::{GenerationRequest, InferenceEngine, TokenFragment};
    use http_body_util::BodyExt;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    struct StaticEngine;

    #[async_trait::async_trait]
    impl InferenceEngine for StaticEngine {
        fn name(&self) -> &str {
            "static"
        }

        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<mpsc::Receiver<Result<TokenFragment, EngineError>>, EngineError> {
            let (tx, rx) = mpsc::channel(4);
            tokio::spawn(async move {
                let _ = tx.send(Ok(TokenFragment::text("pong"))).await;
                let _ = tx.send(Ok(TokenFragment::end())).await;
            });
            Ok(rx)
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>, EngineError> {
            Ok(vec![ModelInfo {
                name: "llama3:latest".into(),
                modified_at: None,
                size: None,
                digest: None,
            }])
        }
    }

    fn test_state() -> SharedState {
        let config = AppConfig::default();
        let engine = Arc::new(StaticEngine);
        let memory = Arc::new(MemoryStore::new(MemoryLimits::default()));
        let index = Arc::new(RetrievalIndex::new(RetrievalParams::default()));
        let tools = Arc::new(default_toolset(Duration::from_millis(500)));
        let assembler = ContextAssembler::new(Budget::new(4096, BudgetUnit::Tokens));
        let orchestrator = Arc::new(Orchestrator::new(
            engine,
            memory,
            index,
            tools,
            assembler,
            OrchestratorSettings::default(),
        ));
        Arc::new(AppState {
            orchestrator,
            config,
        })
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["engine"], true);
    }

    #[tokio::test]
    async fn models_endpoint_lists_installed_models() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/models")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["models"][0]["name"], "llama3:latest");
    }

    #[tokio::test]
    async fn session_lifecycle_over_http() {
        let state = test_state();

        // Open
        let response = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/sessions")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"model":"llama3","system_prompt":"Be terse."}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        let id = json["session_id"].as_str().unwrap().to_string();

        // History contains the synthetic system turn
        let response = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .uri(format!("/api/sessions/{id}/history"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["turns"][0]["role"], "system");

        // Session info
        let response = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .uri(format!("/api/sessions/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["model"], "llama3");
        assert_eq!(json["turn_count"], 0);

        // Close, then close again (idempotent surface, different status)
        let response = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/sessions/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = build_router(state)
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/sessions/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_model_yields_404_on_open() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/sessions")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"model":"nope"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn chat_turn_over_http() {
        let state = test_state();
        let id = state
            .orchestrator
            .open_session("llama3", "")
            .await
            .unwrap();

        let body = format!(r#"{{"session_id":"{}","message":"ping"}}"#, id.0);
        let response = build_router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["response"], "pong");
    }

    #[tokio::test]
    async fn chat_against_unknown_session_yields_404() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"session_id":"ghost","message":"hi"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_document_yields_400() {
        let state = test_state();
        let id = state
            .orchestrator
            .open_session("llama3", "")
            .await
            .unwrap();

        let body = format!(
            r#"{{"session_id":"{}","source_name":"notes.txt","text":"   "}}"#,
            id.0
        );
        let response = build_router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/documents")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn direct_tool_invocation() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/tools/weather")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"query":"weather in Tokyo"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["tool_name"], "weather");
        assert_eq!(json["outcome"]["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_tool_yields_404() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/tools/calculator")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"query":"2+2"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn orchestrator_builds_from_default_config() {
        let config = AppConfig::default();
        assert!(build_orchestrator(&config).is_ok());
    }
}
