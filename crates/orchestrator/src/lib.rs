//! Turn orchestration for Coxswain.
//!
//! The [`Orchestrator`] drives each chat turn through a fixed sequence of
//! phases: route the message to at most one tool, run it, query the
//! session's retrieval index, assemble a budget-bounded context, stream
//! generation from the engine, and persist the exchange into session
//! memory. Same-session turns are serialized; different sessions run
//! concurrently.

pub mod assembler;
pub mod budget;
pub mod router;
pub mod stream_event;
pub mod turn;

pub use assembler::{
    AssembledContext, AssemblyError, AssemblyMetadata, ContextAssembler, DropInfo, LayerStats,
};
pub use budget::{Budget, BudgetUnit};
pub use router::classify;
pub use stream_event::TurnEvent;
pub use turn::{BusyPolicy, Orchestrator, OrchestratorSettings, TurnPhase, TurnReply};
