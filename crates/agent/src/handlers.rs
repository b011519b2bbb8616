//! Node handlers
//!
//! Side-effecting logic attached to graph nodes: retrieval-backed product
//! Q&A and the demo-scheduling function call. Handlers return a typed
//! error instead of panicking; the orchestrator downgrades any failure to
//! a generic apology while keeping the node transition.

use crate::graph::HandlerKind;
use crate::prompts;
use async_trait::async_trait;
use sales_agent_core::records::{CustomerRecord, EventRecord};
use sales_agent_core::SessionState;
use sales_agent_llm::backend::{CompletionBackend, CompletionOptions};
use sales_agent_persistence::{CustomerStore, EventStore};
use sales_agent_rag::retriever::{PassageRetriever, ProductRetriever};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

pub const SCHEDULE_DEMO_EVENT: &str = "schedule_demo";

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Completion failed: {0}")]
    Completion(String),

    #[error("Provider declined the expected tool call: {0}")]
    NoToolCall(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),
}

/// Node-attached capability: takes the raw user input and the already
/// transitioned session, returns the handler's text.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    async fn handle(&self, input: &str, session: &SessionState) -> Result<String, HandlerError>;
}

/// Retrieval-augmented product Q&A.
///
/// Embeds the question, fetches the top-k most similar passages and asks
/// the completion backend to answer strictly from that context block.
pub struct ProductQaHandler {
    backend: Arc<dyn CompletionBackend>,
    retriever: Arc<dyn PassageRetriever>,
    top_k: usize,
}

impl ProductQaHandler {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        retriever: Arc<dyn PassageRetriever>,
        top_k: usize,
    ) -> Self {
        Self {
            backend,
            retriever,
            top_k,
        }
    }
}

#[async_trait]
impl NodeHandler for ProductQaHandler {
    async fn handle(&self, input: &str, session: &SessionState) -> Result<String, HandlerError> {
        tracing::info!(session_id = %session.session_id, question = input, "Getting product details");

        let matches = self
            .retriever
            .search_by_text(input, self.top_k)
            .await
            .map_err(|e| HandlerError::Retrieval(e.to_string()))?;

        let product_info = ProductRetriever::format_context(&matches);
        tracing::debug!(match_count = matches.len(), "Retrieved relevant product info");

        let response = self
            .backend
            .complete(
                prompts::PRODUCT_DETAILS_SYSTEM_PROMPT,
                &prompts::product_details_user_prompt(&product_info, input),
                &CompletionOptions::default(),
            )
            .await
            .map_err(|e| HandlerError::Completion(e.to_string()))?;

        if response.is_empty() {
            return Err(HandlerError::Completion(
                "No response received from chat completion".to_string(),
            ));
        }

        Ok(response)
    }
}

/// Arguments the provider supplies to the `schedule_demo` tool.
#[derive(Debug, Clone, Deserialize)]
struct DemoArguments {
    name: String,
    email: String,
    #[serde(rename = "productInterest", default)]
    product_interest: Vec<String>,
    date: String,
}

/// Demo scheduling via the completion backend's function-calling mode.
///
/// Requires the backend to call the single offered tool; a declined call
/// is a hard failure. On success the event and customer record are
/// written concurrently.
pub struct ScheduleDemoHandler {
    backend: Arc<dyn CompletionBackend>,
    customers: Arc<dyn CustomerStore>,
    events: Arc<dyn EventStore>,
}

impl ScheduleDemoHandler {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        customers: Arc<dyn CustomerStore>,
        events: Arc<dyn EventStore>,
    ) -> Self {
        Self {
            backend,
            customers,
            events,
        }
    }

    async fn record_demo(
        &self,
        args: &DemoArguments,
        session: &SessionState,
    ) -> Result<(), HandlerError> {
        let event = EventRecord::new(
            &session.session_id,
            SCHEDULE_DEMO_EVENT,
            serde_json::json!({
                "name": args.name,
                "email": args.email,
                "productInterest": args.product_interest,
                "date": args.date,
            }),
        )
        .with_metadata(serde_json::json!({
            "history": session.history,
            "currentNodeId": session.current_node_id,
        }));

        let customer = CustomerRecord::new(
            &session.session_id,
            &args.name,
            &args.email,
            args.product_interest.clone(),
        );

        let (event_result, customer_result) = tokio::join!(
            self.events.create_event(&event),
            self.customers.upsert_customer(&customer),
        );
        event_result.map_err(|e| HandlerError::Persistence(e.to_string()))?;
        customer_result.map_err(|e| HandlerError::Persistence(e.to_string()))?;

        tracing::info!(
            session_id = %session.session_id,
            name = %args.name,
            date = %args.date,
            "Demo scheduled successfully"
        );

        Ok(())
    }
}

#[async_trait]
impl NodeHandler for ScheduleDemoHandler {
    async fn handle(&self, input: &str, session: &SessionState) -> Result<String, HandlerError> {
        let tool = prompts::demo_tool();

        let call = self
            .backend
            .complete_with_tools(
                &prompts::demo_system_prompt(&tool),
                &prompts::demo_user_prompt(&session.context, &session.history, input),
                &[tool],
            )
            .await
            .map_err(|e| HandlerError::Completion(e.to_string()))?
            .ok_or_else(|| {
                HandlerError::NoToolCall("No function call response from backend".to_string())
            })?;

        if call.name != "schedule_demo" {
            return Err(HandlerError::NoToolCall(format!(
                "Unexpected function call: {}",
                call.name
            )));
        }

        let args: DemoArguments = serde_json::from_str(&call.arguments)
            .map_err(|e| HandlerError::InvalidArguments(e.to_string()))?;

        self.record_demo(&args, session).await?;

        Ok(format!(
            "Demo scheduled successfully for {} ({}) on {}",
            args.name, args.email, args.date
        ))
    }
}

/// Maps a node's declared handler kind to its implementation.
pub struct HandlerRegistry {
    product_qa: Arc<dyn NodeHandler>,
    schedule_demo: Arc<dyn NodeHandler>,
}

impl HandlerRegistry {
    pub fn new(product_qa: Arc<dyn NodeHandler>, schedule_demo: Arc<dyn NodeHandler>) -> Self {
        Self {
            product_qa,
            schedule_demo,
        }
    }

    pub fn resolve(&self, kind: HandlerKind) -> &dyn NodeHandler {
        match kind {
            HandlerKind::ProductQa => self.product_qa.as_ref(),
            HandlerKind::ScheduleDemo => self.schedule_demo.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_arguments_parse_camel_case_interest_list() {
        let json = r#"{
            "name": "Ana",
            "email": "a@x.com",
            "productInterest": ["EC2", "S3"],
            "date": "02-09-2026 15:00:00"
        }"#;
        let args: DemoArguments = serde_json::from_str(json).unwrap();
        assert_eq!(args.name, "Ana");
        assert_eq!(args.product_interest, vec!["EC2", "S3"]);
    }

    #[test]
    fn demo_arguments_tolerate_missing_interest() {
        let json = r#"{"name": "Ana", "email": "a@x.com", "date": "tomorrow"}"#;
        let args: DemoArguments = serde_json::from_str(json).unwrap();
        assert!(args.product_interest.is_empty());
    }
}
