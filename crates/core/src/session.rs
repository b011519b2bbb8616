//! Per-connection session state
//!
//! In-memory only; durable artifacts (messages, customer record, events)
//! are written through the persistence crate.

use serde::{Deserialize, Serialize};

use crate::context::Context;

/// Conversational state for one live connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    /// Opaque unique identifier, generated at connection time.
    pub session_id: String,
    /// Facts extracted from the user so far. Monotonic: keys are
    /// overwritten, never removed.
    pub context: Context,
    /// Node the session is currently positioned at.
    pub current_node_id: String,
    /// Ordered "User: …" / "AI: …" lines, used as LLM context.
    pub history: Vec<String>,
}

impl SessionState {
    /// Fresh session positioned at the given entry node.
    pub fn new(session_id: impl Into<String>, entry_node_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            context: Context::new(),
            current_node_id: entry_node_id.into(),
            history: Vec::new(),
        }
    }

    /// Append one completed turn to the history.
    pub fn push_turn(&mut self, user_input: &str, ai_response: &str) {
        self.history.push(format!("User: {}", user_input));
        self.history.push(format!("AI: {}", ai_response));
    }

    /// Append an assistant-only line (e.g. the welcome message).
    pub fn push_ai_line(&mut self, ai_response: &str) {
        self.history.push(format!("AI: {}", ai_response));
    }

    /// Number of completed user turns.
    pub fn turn_count(&self) -> usize {
        self.history
            .iter()
            .filter(|line| line.starts_with("User: "))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_turn_appends_in_order() {
        let mut session = SessionState::new("s1", "welcome");
        session.push_ai_line("Hello!");
        session.push_turn("Hi, I'm Ana", "Nice to meet you, Ana!");

        assert_eq!(
            session.history,
            vec![
                "AI: Hello!",
                "User: Hi, I'm Ana",
                "AI: Nice to meet you, Ana!",
            ]
        );
        assert_eq!(session.turn_count(), 1);
    }
}
