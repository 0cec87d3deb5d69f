//! The in-memory session store.
//!
//! Each session's log sits behind its own `RwLock`, so reads on different
//! sessions never contend and a same-session write excludes readers. The
//! outer map lock is held only long enough to clone the per-session `Arc`.
//!
//! Turn serialization is a separate concern: every session carries one
//! exclusive turn lock (`Arc<Mutex<()>>`) that the orchestrator holds for
//! the duration of a turn. Log mutation itself happens in short critical
//! sections and never while a tool or the engine is in flight.

use chrono::{DateTime, Utc};
use coxswain_core::error::MemoryError;
use coxswain_core::turn::{Role, SessionId, Turn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Truncation limits for a session's conversation log.
#[derive(Debug, Clone)]
pub struct MemoryLimits {
    /// Maximum turns kept before oldest-first eviction.
    pub max_turns: usize,

    /// Maximum total characters kept across the log.
    pub max_chars: usize,

    /// The most recent turns truncation must always retain verbatim.
    pub retain_turns: usize,
}

impl Default for MemoryLimits {
    fn default() -> Self {
        Self {
            max_turns: 200,
            max_chars: 200_000,
            retain_turns: 8,
        }
    }
}

/// Summary of one live session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub model: String,
    pub turn_count: usize,
    pub created_at: DateTime<Utc>,
}

struct SessionState {
    model: String,
    system_prompt: String,
    created_at: DateTime<Utc>,
    turns: Vec<Turn>,
}

struct SessionEntry {
    state: Arc<RwLock<SessionState>>,
    /// One exclusive lock per session serializes whole turns.
    turn_lock: Arc<Mutex<()>>,
}

/// Per-session ordered conversation logs. Pure data structure, no I/O.
pub struct MemoryStore {
    limits: MemoryLimits,
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
}

impl MemoryStore {
    pub fn new(limits: MemoryLimits) -> Self {
        Self {
            limits,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Allocate a new session. Never fails.
    pub async fn open(&self, model: impl Into<String>, system_prompt: impl Into<String>) -> SessionId {
        let id = SessionId::new();
        let entry = SessionEntry {
            state: Arc::new(RwLock::new(SessionState {
                model: model.into(),
                system_prompt: system_prompt.into(),
                created_at: Utc::now(),
                turns: Vec::new(),
            })),
            turn_lock: Arc::new(Mutex::new(())),
        };
        self.sessions.write().await.insert(id.clone(), entry);
        debug!(session_id = %id, "Session opened");
        id
    }

    /// Whether a session is live.
    pub async fn exists(&self, session_id: &SessionId) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// The per-session turn lock, for orchestrator-level serialization.
    pub async fn turn_lock(&self, session_id: &SessionId) -> Result<Arc<Mutex<()>>, MemoryError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .map(|e| e.turn_lock.clone())
            .ok_or_else(|| MemoryError::SessionNotFound(session_id.to_string()))
    }

    /// The model and system prompt a session was opened with.
    pub async fn session_meta(&self, session_id: &SessionId) -> Result<(String, String), MemoryError> {
        let state = self.state(session_id).await?;
        let guard = state.read().await;
        Ok((guard.model.clone(), guard.system_prompt.clone()))
    }

    /// Append a turn, applying oldest-first truncation when over budget.
    pub async fn append(&self, session_id: &SessionId, turn: Turn) -> Result<(), MemoryError> {
        let state = self.state(session_id).await?;
        let mut guard = state.write().await;
        guard.turns.push(turn);
        self.truncate(&mut guard.turns, session_id);
        Ok(())
    }

    /// The most recent `max_turns` turns, oldest-first, preceded by a
    /// synthetic system turn when the session has a system prompt.
    pub async fn history(
        &self,
        session_id: &SessionId,
        max_turns: Option<usize>,
    ) -> Result<Vec<Turn>, MemoryError> {
        let state = self.state(session_id).await?;
        let guard = state.read().await;

        let take = max_turns.unwrap_or(guard.turns.len()).min(guard.turns.len());
        let start = guard.turns.len() - take;

        let mut out = Vec::with_capacity(take + 1);
        if !guard.system_prompt.is_empty() {
            out.push(Turn {
                role: Role::System,
                content: guard.system_prompt.clone(),
                timestamp: guard.created_at,
                tool_name: None,
            });
        }
        out.extend_from_slice(&guard.turns[start..]);
        Ok(out)
    }

    /// Summaries for all live sessions.
    pub async fn sessions(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.read().await;
        let mut out = Vec::with_capacity(sessions.len());
        for (id, entry) in sessions.iter() {
            let guard = entry.state.read().await;
            out.push(SessionInfo {
                session_id: id.clone(),
                model: guard.model.clone(),
                turn_count: guard.turns.len(),
                created_at: guard.created_at,
            });
        }
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        out
    }

    /// Summary for one session.
    pub async fn session_info(&self, session_id: &SessionId) -> Result<SessionInfo, MemoryError> {
        let state = self.state(session_id).await?;
        let guard = state.read().await;
        Ok(SessionInfo {
            session_id: session_id.clone(),
            model: guard.model.clone(),
            turn_count: guard.turns.len(),
            created_at: guard.created_at,
        })
    }

    /// Drop a session's log but keep the session live.
    pub async fn clear(&self, session_id: &SessionId) -> Result<(), MemoryError> {
        let state = self.state(session_id).await?;
        state.write().await.turns.clear();
        Ok(())
    }

    /// Destroy a session. Idempotent — closing an unknown id is a no-op.
    pub async fn close(&self, session_id: &SessionId) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            debug!(session_id = %session_id, "Session closed");
        }
        removed
    }

    async fn state(&self, session_id: &SessionId) -> Result<Arc<RwLock<SessionState>>, MemoryError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .map(|e| e.state.clone())
            .ok_or_else(|| MemoryError::SessionNotFound(session_id.to_string()))
    }

    /// Evict oldest turns while over either budget. The most recent
    /// `retain_turns` turns are never evicted, even when over the char
    /// budget — a single oversized turn must not wipe the conversation.
    fn truncate(&self, turns: &mut Vec<Turn>, session_id: &SessionId) {
        let mut evicted = 0usize;
        loop {
            if turns.len() <= self.limits.retain_turns {
                break;
            }
            let total_chars: usize = turns.iter().map(Turn::chars).sum();
            if turns.len() <= self.limits.max_turns && total_chars <= self.limits.max_chars {
                break;
            }
            turns.remove(0);
            evicted += 1;
        }
        if evicted > 0 {
            debug!(session_id = %session_id, evicted, "Conversation log truncated");
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(MemoryLimits::default())
    }
}
