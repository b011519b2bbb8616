//! Conversation orchestrator
//!
//! The per-turn state machine: analyze the user input against the current
//! node's candidates, merge extracted fields into context, transition,
//! run the new node's handler if it has one, pick the outgoing message,
//! then persist the transcript and customer record.

use crate::analyzer::{InputAnalysis, InputAnalyzer};
use crate::graph::ConversationGraph;
use crate::handlers::HandlerRegistry;
use crate::AgentError;
use sales_agent_core::records::{CustomerRecord, MessageRecord, MessageRole};
use sales_agent_core::SessionState;
use sales_agent_persistence::{CustomerStore, MessageStore};
use std::sync::Arc;

const HANDLER_FAILURE_RESPONSE: &str =
    "I'm sorry, I encountered an issue. Could you please try again?";

/// Result of one fully processed turn.
#[derive(Debug)]
pub struct TurnOutcome {
    pub message_to_user: String,
    pub updated_session: SessionState,
}

/// A processed and persisted turn. Persistence failures never roll back
/// the reply the user already received; they are reported alongside it.
#[derive(Debug)]
pub struct HandledTurn {
    pub response: String,
    pub updated_session: SessionState,
    pub persistence_error: Option<String>,
}

pub struct Orchestrator {
    graph: Arc<ConversationGraph>,
    analyzer: InputAnalyzer,
    handlers: HandlerRegistry,
    messages: Arc<dyn MessageStore>,
    customers: Arc<dyn CustomerStore>,
}

impl Orchestrator {
    pub fn new(
        graph: Arc<ConversationGraph>,
        analyzer: InputAnalyzer,
        handlers: HandlerRegistry,
        messages: Arc<dyn MessageStore>,
        customers: Arc<dyn CustomerStore>,
    ) -> Self {
        Self {
            graph,
            analyzer,
            handlers,
            messages,
            customers,
        }
    }

    pub fn graph(&self) -> &ConversationGraph {
        &self.graph
    }

    /// Create a fresh session at the entry node and persist its welcome
    /// message. Returns the session and the rendered welcome text.
    pub async fn start_session(
        &self,
        session_id: &str,
    ) -> Result<(SessionState, String), AgentError> {
        let mut session = SessionState::new(session_id, self.graph.entry_node_id());
        let welcome = self.graph.entry_node().render_prompt(&session.context);
        session.push_ai_line(&welcome);

        self.messages
            .create_message(&MessageRecord::new(session_id, &welcome, MessageRole::Ai))
            .await
            .map_err(|e| AgentError::Persistence(e.to_string()))?;

        tracing::debug!(session_id, "Session created");
        Ok((session, welcome))
    }

    /// Run the per-turn state machine without persistence.
    ///
    /// The node/context transition is kept even when the handler fails;
    /// only the user-visible message degrades to a generic apology.
    pub async fn process_turn(
        &self,
        user_input: &str,
        session: &SessionState,
    ) -> Result<TurnOutcome, AgentError> {
        let current_node = self
            .graph
            .get_node(&session.current_node_id)
            .ok_or_else(|| AgentError::InvalidNode(session.current_node_id.clone()))?;

        tracing::info!(
            session_id = %session.session_id,
            current_node_id = %session.current_node_id,
            "Analyzing user input"
        );

        let analysis = self
            .analyzer
            .analyze(
                user_input,
                &session.history,
                &session.context,
                &self.graph,
                &current_node.next_node_ids,
            )
            .await;

        let updated_session = self.apply_analysis(session, user_input, &analysis);

        let mut message_to_user = analysis.suggested_response.clone();

        if let Some(updated_node) = self.graph.get_node(&updated_session.current_node_id) {
            if let Some(kind) = updated_node.handler {
                tracing::info!(
                    session_id = %updated_session.session_id,
                    node_id = %updated_node.id,
                    "Executing node handler"
                );

                match self
                    .handlers
                    .resolve(kind)
                    .handle(user_input, &updated_session)
                    .await
                {
                    Ok(handler_result) => {
                        message_to_user = if updated_node.consume_response {
                            handler_result
                        } else if analysis.suggested_response.is_empty() {
                            handler_result
                        } else {
                            analysis.suggested_response.clone()
                        };
                    }
                    Err(error) => {
                        tracing::error!(
                            session_id = %updated_session.session_id,
                            node_id = %updated_node.id,
                            %error,
                            "Node handler failed"
                        );
                        message_to_user = HANDLER_FAILURE_RESPONSE.to_string();
                    }
                }
            }
        }

        Ok(TurnOutcome {
            message_to_user,
            updated_session,
        })
    }

    /// Full turn: state machine plus persistence.
    ///
    /// The user message and the reply are saved sequentially to keep the
    /// transcript causally ordered; the customer record saves concurrently
    /// with that pair.
    pub async fn handle_message(
        &self,
        user_input: &str,
        metadata: Option<serde_json::Value>,
        session: &SessionState,
    ) -> Result<HandledTurn, AgentError> {
        let TurnOutcome {
            message_to_user,
            updated_session,
        } = self.process_turn(user_input, session).await?;

        let (messages_result, customer_result) = tokio::join!(
            self.save_messages(&session.session_id, user_input, metadata, &message_to_user),
            self.save_customer_if_complete(&updated_session),
        );

        let persistence_error = messages_result
            .err()
            .or(customer_result.err())
            .map(|e| e.to_string());

        if let Some(error) = &persistence_error {
            tracing::error!(
                session_id = %session.session_id,
                error,
                "Turn persistence failed"
            );
        }

        Ok(HandledTurn {
            response: message_to_user,
            updated_session,
            persistence_error,
        })
    }

    fn apply_analysis(
        &self,
        session: &SessionState,
        user_input: &str,
        analysis: &InputAnalysis,
    ) -> SessionState {
        let mut updated = session.clone();
        updated.context.merge(analysis.user_inputs.clone());
        updated.current_node_id = analysis.next_node_id.clone();
        updated.push_turn(user_input, &analysis.suggested_response);

        tracing::debug!(
            session_id = %updated.session_id,
            current_node_id = %updated.current_node_id,
            "Session updated with analysis"
        );

        updated
    }

    // Sequential on purpose, user message first.
    async fn save_messages(
        &self,
        session_id: &str,
        user_input: &str,
        metadata: Option<serde_json::Value>,
        ai_response: &str,
    ) -> Result<(), AgentError> {
        self.messages
            .create_message(
                &MessageRecord::new(session_id, user_input, MessageRole::User)
                    .with_metadata(metadata),
            )
            .await
            .map_err(|e| AgentError::Persistence(e.to_string()))?;

        self.messages
            .create_message(&MessageRecord::new(session_id, ai_response, MessageRole::Ai))
            .await
            .map_err(|e| AgentError::Persistence(e.to_string()))?;

        Ok(())
    }

    async fn save_customer_if_complete(&self, session: &SessionState) -> Result<(), AgentError> {
        let (name, email) = match (session.context.text("name"), session.context.text("email")) {
            (Some(name), Some(email)) => (name, email),
            _ => {
                tracing::debug!(
                    session_id = %session.session_id,
                    "Skipping customer save - incomplete information"
                );
                return Ok(());
            }
        };

        let product_interest = session
            .context
            .list("product_interest")
            .or_else(|| session.context.list("productInterest"))
            .map(|l| l.to_vec())
            .unwrap_or_default();

        let record = CustomerRecord::new(&session.session_id, name, email, product_interest);
        self.customers
            .upsert_customer(&record)
            .await
            .map_err(|e| AgentError::Persistence(e.to_string()))?;

        tracing::info!(
            session_id = %session.session_id,
            name,
            email,
            "Customer information saved"
        );

        Ok(())
    }
}
