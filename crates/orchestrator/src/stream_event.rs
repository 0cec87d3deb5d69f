//! Turn-level streaming events.
//!
//! `TurnEvent` wraps engine fragments and tool activity into the events
//! the gateway forwards to clients over SSE.

use coxswain_core::turn::SessionId;
use serde::{Deserialize, Serialize};

/// Events emitted while a turn is being processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// A tool was selected and is running.
    ToolStarted { tool: String, query: String },

    /// The tool finished (successfully or not). Failures never abort the
    /// turn; the context is simply assembled without the result.
    ToolCompleted {
        tool: String,
        success: bool,
        latency_ms: u64,
    },

    /// Partial response text from the engine.
    Token { content: String },

    /// The turn completed and was persisted.
    Done {
        session_id: SessionId,
        response_chars: usize,
        context_cost: usize,
        /// Whether the persisted response is a truncated partial.
        truncated: bool,
    },

    /// The turn failed mid-stream.
    Error { message: String },
}

impl TurnEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ToolStarted { .. } => "tool_started",
            Self::ToolCompleted { .. } => "tool_completed",
            Self::Token { .. } => "token",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_event_serialization() {
        let event = TurnEvent::Token {
            content: "Hel".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"token""#));
        assert!(json.contains(r#""content":"Hel""#));
    }

    #[test]
    fn done_event_serialization() {
        let event = TurnEvent::Done {
            session_id: SessionId::from("s1"),
            response_chars: 42,
            context_cost: 100,
            truncated: false,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"done""#));
        assert!(json.contains(r#""response_chars":42"#));
    }

    #[test]
    fn event_type_names() {
        assert_eq!(
            TurnEvent::Token { content: "x".into() }.event_type(),
            "token"
        );
        assert_eq!(
            TurnEvent::Error { message: "x".into() }.event_type(),
            "error"
        );
        assert_eq!(
            TurnEvent::ToolStarted {
                tool: "weather".into(),
                query: "q".into()
            }
            .event_type(),
            "tool_started"
        );
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"token","content":"hi"}"#;
        let event: TurnEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, TurnEvent::Token { content } if content == "hi"));
    }
}
