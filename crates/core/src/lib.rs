//! # Coxswain Core
//!
//! Domain types, traits, and error definitions for the Coxswain chat
//! orchestrator. This crate has **zero framework dependencies** — it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (inference engine, tools, embedding backend)
//! is defined as a trait here. Implementations live in their respective
//! crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod embed;
pub mod engine;
pub mod error;
pub mod tool;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use embed::Embedder;
pub use engine::{GenerationRequest, InferenceEngine, ModelInfo, TokenFragment};
pub use error::{EngineError, Error, MemoryError, Result, RetrievalError, ToolError};
pub use tool::{Tool, ToolInvocation, ToolOutcome, ToolRoute};
pub use turn::{ChatTurnRequest, Role, SessionId, Turn};
