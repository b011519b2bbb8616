//! Completion provider integration
//!
//! Wraps an OpenAI-compatible chat completions API (Together AI by default)
//! behind the `CompletionBackend` trait so the agent can be tested with
//! substitute providers.

pub mod backend;
pub mod prompt;

pub use backend::{CompletionBackend, CompletionOptions, TogetherBackend, TogetherConfig};
pub use prompt::{Message, Role, ToolBuilder, ToolCall, ToolDefinition};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for sales_agent_core::Error {
    fn from(err: LlmError) -> Self {
        sales_agent_core::Error::Llm(err.to_string())
    }
}
