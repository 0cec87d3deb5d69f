//! The turn state machine.
//!
//! Every chat turn moves through the same phases:
//!
//! ```text
//! Received -> Routing -> Tooling -> Assembling -> Generating -> Completed
//! ```
//!
//! Routing and Tooling are skipped when the request does not enable
//! web-class tools. A failure in Tooling is contained (the turn continues
//! without the result); a failure in Generating is turn-fatal, but any
//! partial response already produced is persisted with a truncation
//! marker so the log never silently loses text the client saw.
//!
//! Same-session turns are serialized on the session's turn lock, which is
//! held for the whole turn. Tool and engine calls never touch the session
//! data locks, so concurrent turns on other sessions proceed freely.

use crate::assembler::{AssembledContext, AssemblyInput, AssemblyMetadata, ContextAssembler};
use crate::router;
use crate::stream_event::TurnEvent;
use coxswain_core::engine::{GenerationRequest, InferenceEngine};
use coxswain_core::error::{EngineError, Error, Result};
use coxswain_core::tool::ToolInvocation;
use coxswain_core::turn::{ChatTurnRequest, SessionId, Turn};
use coxswain_memory::MemoryStore;
use coxswain_retrieval::RetrievalIndex;
use coxswain_tools::ToolSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

/// Appended to a persisted response that did not run to completion.
pub const TRUNCATION_MARKER: &str = " [response truncated]";

/// The phases a turn moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Received,
    Routing,
    Tooling,
    Assembling,
    Generating,
    Completed,
    Failed,
}

impl TurnPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Routing => "routing",
            Self::Tooling => "tooling",
            Self::Assembling => "assembling",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// What happens when a turn arrives while another is in flight on the
/// same session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusyPolicy {
    /// Queue behind the in-flight turn.
    #[default]
    Wait,
    /// Fail fast with `SessionBusy`.
    Reject,
}

impl BusyPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "wait" => Some(Self::Wait),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// Orchestrator-level knobs.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorSettings {
    pub busy_policy: BusyPolicy,
    /// Whether successful tool output is also appended to the log as a
    /// `tool` turn. Off by default; tool results are transient otherwise.
    pub log_tool_turns: bool,
}

/// The completed result of a non-streaming turn.
#[derive(Debug)]
pub struct TurnReply {
    pub session_id: SessionId,
    pub response: String,
    pub tool_invocation: Option<ToolInvocation>,
    pub assembly: AssemblyMetadata,
}

/// Drives chat turns end to end. Cheap to share behind an `Arc`.
pub struct Orchestrator {
    engine: Arc<dyn InferenceEngine>,
    memory: Arc<MemoryStore>,
    index: Arc<RetrievalIndex>,
    tools: Arc<ToolSet>,
    assembler: ContextAssembler,
    settings: OrchestratorSettings,
}

/// Everything gathered before generation starts. Holding this holds the
/// session's turn lock.
struct PreparedTurn {
    turn_guard: OwnedMutexGuard<()>,
    model: String,
    context: AssembledContext,
    invocation: Option<ToolInvocation>,
}

impl Orchestrator {
    pub fn new(
        engine: Arc<dyn InferenceEngine>,
        memory: Arc<MemoryStore>,
        index: Arc<RetrievalIndex>,
        tools: Arc<ToolSet>,
        assembler: ContextAssembler,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            engine,
            memory,
            index,
            tools,
            assembler,
            settings,
        }
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    pub fn index(&self) -> &Arc<RetrievalIndex> {
        &self.index
    }

    pub fn tools(&self) -> &Arc<ToolSet> {
        &self.tools
    }

    pub fn engine(&self) -> &Arc<dyn InferenceEngine> {
        &self.engine
    }

    /// Open a session after verifying the model is installed.
    pub async fn open_session(&self, model: &str, system_prompt: &str) -> Result<SessionId> {
        if !self.engine.model_exists(model).await? {
            return Err(Error::InferenceUnavailable(EngineError::ModelNotFound(
                model.to_string(),
            )));
        }
        Ok(self.memory.open(model, system_prompt).await)
    }

    /// Close a session and drop its retrieval index. Idempotent.
    pub async fn close_session(&self, session_id: &SessionId) -> bool {
        self.index.remove_session(session_id).await;
        self.memory.close(session_id).await
    }

    /// Ingest a document into a session's retrieval index.
    pub async fn ingest_document(
        &self,
        session_id: &SessionId,
        source_name: &str,
        text: &str,
    ) -> Result<usize> {
        if !self.memory.exists(session_id).await {
            return Err(Error::SessionNotFound(session_id.to_string()));
        }
        Ok(self.index.ingest(session_id, source_name, text).await?)
    }

    /// Run a turn to completion and return the aggregated response.
    pub async fn run_turn(&self, request: ChatTurnRequest) -> Result<TurnReply> {
        let prepared = self.prepare(&request, None).await?;

        debug!(session_id = %request.session_id, phase = TurnPhase::Generating.as_str(), "Phase transition");
        let mut fragments = match self
            .engine
            .generate(GenerationRequest {
                model: prepared.model.clone(),
                system: prepared.context.system.clone(),
                turns: prepared.context.turns.clone(),
                stream: true,
            })
            .await
        {
            Ok(rx) => rx,
            Err(e) => {
                debug!(session_id = %request.session_id, phase = TurnPhase::Failed.as_str(), "Phase transition");
                self.record_user_turn(&request).await?;
                return Err(e.into());
            }
        };

        let mut response = String::new();
        while let Some(item) = fragments.recv().await {
            match item {
                Ok(fragment) => {
                    if fragment.done {
                        break;
                    }
                    response.push_str(&fragment.content);
                }
                Err(e) => {
                    debug!(session_id = %request.session_id, phase = TurnPhase::Failed.as_str(), "Phase transition");
                    self.persist_exchange(&request, prepared.invocation.as_ref(), &response, true)
                        .await?;
                    return Err(e.into());
                }
            }
        }

        self.persist_exchange(&request, prepared.invocation.as_ref(), &response, false)
            .await?;
        debug!(session_id = %request.session_id, phase = TurnPhase::Completed.as_str(), "Phase transition");
        info!(
            session_id = %request.session_id,
            response_chars = response.len(),
            context_cost = prepared.context.metadata.total_cost,
            "Turn completed"
        );

        drop(prepared.turn_guard);
        Ok(TurnReply {
            session_id: request.session_id,
            response,
            tool_invocation: prepared.invocation,
            assembly: prepared.context.metadata,
        })
    }

    /// Run a turn, streaming events as they happen.
    ///
    /// Errors that occur before generation starts (unknown session, busy
    /// session under the reject policy, unknown model) are returned
    /// directly; anything after that arrives as a [`TurnEvent::Error`].
    /// Dropping the receiver cancels the turn: generation stops and the
    /// partial response is persisted with the truncation marker.
    pub async fn stream_turn(
        &self,
        request: ChatTurnRequest,
    ) -> Result<mpsc::Receiver<TurnEvent>> {
        let (tx, rx) = mpsc::channel(64);
        let prepared = self.prepare(&request, Some(&tx)).await?;

        debug!(session_id = %request.session_id, phase = TurnPhase::Generating.as_str(), "Phase transition");
        let mut fragments = match self
            .engine
            .generate(GenerationRequest {
                model: prepared.model.clone(),
                system: prepared.context.system.clone(),
                turns: prepared.context.turns.clone(),
                stream: true,
            })
            .await
        {
            Ok(rx) => rx,
            Err(e) => {
                debug!(session_id = %request.session_id, phase = TurnPhase::Failed.as_str(), "Phase transition");
                self.record_user_turn(&request).await?;
                return Err(e.into());
            }
        };

        let memory = self.memory.clone();
        let log_tool_turns = self.settings.log_tool_turns;
        let context_cost = prepared.context.metadata.total_cost;

        tokio::spawn(async move {
            // The turn lock is held until this task finishes.
            let _turn_guard = prepared.turn_guard;
            let session_id = request.session_id.clone();

            let mut response = String::new();
            let mut failure: Option<String> = None;
            let mut cancelled = false;

            while let Some(item) = fragments.recv().await {
                match item {
                    Ok(fragment) => {
                        if fragment.done {
                            break;
                        }
                        response.push_str(&fragment.content);
                        if tx
                            .send(TurnEvent::Token {
                                content: fragment.content,
                            })
                            .await
                            .is_err()
                        {
                            cancelled = true;
                            break;
                        }
                    }
                    Err(e) => {
                        failure = Some(e.to_string());
                        break;
                    }
                }
            }

            let truncated = cancelled || failure.is_some();
            if let Err(e) = persist(
                &memory,
                &request,
                prepared.invocation.as_ref(),
                &response,
                truncated,
                log_tool_turns,
            )
            .await
            {
                warn!(session_id = %session_id, error = %e, "Failed to persist turn");
            }

            if let Some(message) = failure {
                debug!(session_id = %session_id, phase = TurnPhase::Failed.as_str(), "Phase transition");
                let _ = tx.send(TurnEvent::Error { message }).await;
            } else if cancelled {
                info!(session_id = %session_id, response_chars = response.len(), "Turn cancelled by client");
            } else {
                debug!(session_id = %session_id, phase = TurnPhase::Completed.as_str(), "Phase transition");
                let _ = tx
                    .send(TurnEvent::Done {
                        session_id: session_id.clone(),
                        response_chars: response.len(),
                        context_cost,
                        truncated: false,
                    })
                    .await;
            }
        });

        Ok(rx)
    }

    /// Phases Received through Assembling. Acquires the turn lock, runs
    /// at most one tool, queries retrieval, and assembles the context.
    async fn prepare(
        &self,
        request: &ChatTurnRequest,
        events: Option<&mpsc::Sender<TurnEvent>>,
    ) -> Result<PreparedTurn> {
        let session_id = &request.session_id;
        debug!(session_id = %session_id, phase = TurnPhase::Received.as_str(), "Phase transition");

        let lock = self.memory.turn_lock(session_id).await?;
        let turn_guard = match self.settings.busy_policy {
            BusyPolicy::Wait => lock.lock_owned().await,
            BusyPolicy::Reject => lock
                .try_lock_owned()
                .map_err(|_| Error::SessionBusy(session_id.to_string()))?,
        };

        let (model, system_prompt) = self.memory.session_meta(session_id).await?;

        // Routing and tooling only when the request opted in. The web tool
        // and the retrieval query are independent and run concurrently.
        let tool_task = async {
            if !request.use_web_search {
                return None;
            }
            debug!(session_id = %session_id, phase = TurnPhase::Routing.as_str(), "Phase transition");
            let route = router::classify(&request.message);
            debug!(session_id = %session_id, route = %route, "Message routed");

            debug!(session_id = %session_id, phase = TurnPhase::Tooling.as_str(), "Phase transition");
            if let Some(tx) = events {
                let _ = tx
                    .send(TurnEvent::ToolStarted {
                        tool: route.as_str().to_string(),
                        query: request.message.clone(),
                    })
                    .await;
            }
            let invocation = self.tools.invoke(route, &request.message).await;
            if let Some(tx) = events {
                let _ = tx
                    .send(TurnEvent::ToolCompleted {
                        tool: invocation.tool_name.clone(),
                        success: invocation.outcome.is_ok(),
                        latency_ms: invocation.latency.as_millis() as u64,
                    })
                    .await;
            }
            Some(invocation)
        };
        let rag_task = async {
            if request.use_rag {
                self.index.query(session_id, &request.message).await
            } else {
                Vec::new()
            }
        };
        let (invocation, chunks) = tokio::join!(tool_task, rag_task);

        let history = self.memory.history(session_id, None).await?;

        debug!(session_id = %session_id, phase = TurnPhase::Assembling.as_str(), "Phase transition");
        let context = self
            .assembler
            .assemble(&AssemblyInput {
                system_prompt: &system_prompt,
                chunks: &chunks,
                tool_invocation: invocation.as_ref(),
                history: &history,
                user_message: &request.message,
            })
            .map_err(|e| Error::Internal(e.to_string()))?;

        debug!(
            session_id = %session_id,
            context_cost = context.metadata.total_cost,
            budget = context.metadata.budget,
            drops = context.metadata.drops.len(),
            "Context assembled"
        );

        Ok(PreparedTurn {
            turn_guard,
            model,
            context,
            invocation,
        })
    }

    /// Record only the user's message. Used when generation fails before
    /// any token arrives, so the conversation is not silently lost.
    async fn record_user_turn(&self, request: &ChatTurnRequest) -> Result<()> {
        self.memory
            .append(&request.session_id, Turn::user(request.message.clone()))
            .await?;
        Ok(())
    }

    async fn persist_exchange(
        &self,
        request: &ChatTurnRequest,
        invocation: Option<&ToolInvocation>,
        response: &str,
        truncated: bool,
    ) -> Result<()> {
        persist(
            &self.memory,
            request,
            invocation,
            response,
            truncated,
            self.settings.log_tool_turns,
        )
        .await
    }
}

/// Append the turn's exchange to session memory. The user turn is always
/// persisted; the assistant turn only when there is response text, with
/// the truncation marker when generation did not run to completion.
async fn persist(
    memory: &MemoryStore,
    request: &ChatTurnRequest,
    invocation: Option<&ToolInvocation>,
    response: &str,
    truncated: bool,
    log_tool_turns: bool,
) -> Result<()> {
    let session_id = &request.session_id;
    memory
        .append(session_id, Turn::user(request.message.clone()))
        .await?;

    if log_tool_turns
        && let Some(invocation) = invocation
        && let Some(result) = invocation.outcome.result()
    {
        memory
            .append(session_id, Turn::tool(invocation.tool_name.clone(), result))
            .await?;
    }

    if !response.is_empty() {
        let content = if truncated {
            format!("{response}{TRUNCATION_MARKER}")
        } else {
            response.to_string()
        };
        memory.append(session_id, Turn::assistant(content)).await?;
    }
    Ok(())
}
