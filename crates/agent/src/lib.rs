//! Conversation engine for the sales agent
//!
//! Drives a scripted, AI-augmented sales conversation:
//! - Static conversation graph with per-node candidate successors
//! - LLM input analysis with a deterministic degraded-mode fallback
//! - Node handlers for retrieval Q&A and demo scheduling
//! - Turn orchestration with transcript and customer persistence

pub mod analyzer;
pub mod graph;
pub mod handlers;
pub mod orchestrator;
pub mod prompts;

pub use analyzer::{extract_basic_user_inputs, fallback_analysis, InputAnalysis, InputAnalyzer};
pub use graph::{ConversationGraph, HandlerKind, Node};
pub use handlers::{
    HandlerError, HandlerRegistry, NodeHandler, ProductQaHandler, ScheduleDemoHandler,
    SCHEDULE_DEMO_EVENT,
};
pub use orchestrator::{HandledTurn, Orchestrator, TurnOutcome};

use thiserror::Error;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Invalid node: {0}")]
    InvalidNode(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl From<HandlerError> for AgentError {
    fn from(err: HandlerError) -> Self {
        AgentError::Handler(err.to_string())
    }
}

impl From<AgentError> for sales_agent_core::Error {
    fn from(err: AgentError) -> Self {
        sales_agent_core::Error::Agent(err.to_string())
    }
}
