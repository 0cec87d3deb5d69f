//! Conversation memory for Coxswain.
//!
//! The [`MemoryStore`] owns every session's ordered conversation log for the
//! lifetime of the process. No I/O, no persistence — sessions die with the
//! process or on explicit close.

pub mod store;

pub use store::{MemoryLimits, MemoryStore, SessionInfo};
