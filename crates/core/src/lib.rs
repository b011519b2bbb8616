//! Core types for the sales agent
//!
//! Shared domain model used across crates:
//! - Conversation context with a closed set of value kinds
//! - Per-connection session state
//! - Persisted record shapes (messages, customers, events)

pub mod context;
pub mod records;
pub mod session;

pub use context::{Context, ContextValue};
pub use records::{CustomerRecord, EventRecord, MessageRecord, MessageRole};
pub use session::SessionState;

use thiserror::Error;

/// Top-level error, collecting failures from downstream crates.
#[derive(Error, Debug)]
pub enum Error {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Retrieval error: {0}")]
    Rag(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
