//! Tool trait — the abstraction over external query capabilities.
//!
//! Tools are side-effect-free lookups the orchestrator may run before
//! generation: web search, weather, encyclopedia, person search. The core
//! never sees HTTP or API keys — only `invoke(query) -> text`.

use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The web-class tool variants the router can select.
///
/// At most one fires per turn; the variants are mutually exclusive by
/// classification order (person lookup > weather > encyclopedia > general).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolRoute {
    PersonSearch,
    Weather,
    Encyclopedia,
    GeneralSearch,
}

impl ToolRoute {
    /// The registry key / wire name for this route.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PersonSearch => "person_search",
            Self::Weather => "weather",
            Self::Encyclopedia => "encyclopedia",
            Self::GeneralSearch => "web_search",
        }
    }

    /// Inverse of [`as_str`](Self::as_str).
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "person_search" => Some(Self::PersonSearch),
            "weather" => Some(Self::Weather),
            "encyclopedia" => Some(Self::Encyclopedia),
            "web_search" => Some(Self::GeneralSearch),
            _ => None,
        }
    }
}

impl std::fmt::Display for ToolRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The core Tool trait.
///
/// Implementations must be idempotent and side-effect-free from the
/// orchestrator's perspective. Timeouts are enforced by the caller, not
/// inside `invoke`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g. "weather").
    fn name(&self) -> &str;

    /// A one-line description of what this tool does.
    fn description(&self) -> &str;

    /// Run the tool against a free-text query.
    async fn invoke(&self, query: &str) -> std::result::Result<String, ToolError>;
}

/// The outcome of one tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ToolOutcome {
    Ok { result: String },
    Err { error: String },
}

impl ToolOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    /// The successful result text, if any.
    pub fn result(&self) -> Option<&str> {
        match self {
            Self::Ok { result } => Some(result),
            Self::Err { .. } => None,
        }
    }
}

/// Record of one tool invocation within a single turn's processing.
///
/// Transient — never persisted unless explicitly logged as a `tool` Turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub input: String,
    pub outcome: ToolOutcome,
    pub latency: Duration,
}

impl ToolInvocation {
    pub fn ok(tool_name: impl Into<String>, input: impl Into<String>, result: impl Into<String>, latency: Duration) -> Self {
        Self {
            tool_name: tool_name.into(),
            input: input.into(),
            outcome: ToolOutcome::Ok {
                result: result.into(),
            },
            latency,
        }
    }

    pub fn err(tool_name: impl Into<String>, input: impl Into<String>, error: &ToolError, latency: Duration) -> Self {
        Self {
            tool_name: tool_name.into(),
            input: input.into(),
            outcome: ToolOutcome::Err {
                error: error.to_string(),
            },
            latency,
        }
    }
}
