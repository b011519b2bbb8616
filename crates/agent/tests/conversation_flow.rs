//! Integration tests for the conversation engine
//!
//! Exercises the per-turn state machine end to end with a scripted
//! completion backend, a scripted retriever and in-memory stores.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use sales_agent_agent::{
    ConversationGraph, HandlerRegistry, InputAnalyzer, Orchestrator, ProductQaHandler,
    ScheduleDemoHandler, SCHEDULE_DEMO_EVENT,
};
use sales_agent_core::records::MessageRole;
use sales_agent_core::SessionState;
use sales_agent_llm::backend::{CompletionBackend, CompletionOptions};
use sales_agent_llm::{LlmError, ToolCall, ToolDefinition};
use sales_agent_persistence::{
    CustomerStore, EventStore, InMemoryCustomerStore, InMemoryEventStore, InMemoryMessageStore,
    MessageStore,
};
use sales_agent_rag::retriever::{PassageMatch, PassageRetriever};
use sales_agent_rag::RagError;

/// Completion backend that replays scripted responses in order.
#[derive(Default)]
struct ScriptedBackend {
    completions: Mutex<VecDeque<Result<String, LlmError>>>,
    tool_calls: Mutex<VecDeque<Result<Option<ToolCall>, LlmError>>>,
}

impl ScriptedBackend {
    fn completion(self, response: &str) -> Self {
        self.completions
            .lock()
            .push_back(Ok(response.to_string()));
        self
    }

    fn failing_completion(self) -> Self {
        self.completions
            .lock()
            .push_back(Err(LlmError::Api("scripted failure".to_string())));
        self
    }

    fn tool_call(self, name: &str, arguments: &str) -> Self {
        self.tool_calls.lock().push_back(Ok(Some(ToolCall {
            name: name.to_string(),
            arguments: arguments.to_string(),
        })));
        self
    }

    fn declined_tool_call(self) -> Self {
        self.tool_calls.lock().push_back(Ok(None));
        self
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        self.completions
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Api("no scripted completion".to_string())))
    }

    async fn complete_with_tools(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _tools: &[ToolDefinition],
    ) -> Result<Option<ToolCall>, LlmError> {
        self.tool_calls
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Api("no scripted tool call".to_string())))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Retriever returning fixed matches, or no matches at all.
struct ScriptedRetriever {
    matches: Vec<PassageMatch>,
}

impl ScriptedRetriever {
    fn with_passage(product: &str, text: &str) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("product_name".to_string(), product.to_string());
        metadata.insert("category".to_string(), "Compute".to_string());
        metadata.insert("section".to_string(), "Overview".to_string());
        Self {
            matches: vec![PassageMatch {
                score: 0.92,
                text: text.to_string(),
                metadata,
            }],
        }
    }

    fn empty() -> Self {
        Self { matches: vec![] }
    }
}

#[async_trait]
impl PassageRetriever for ScriptedRetriever {
    async fn search_by_text(
        &self,
        _question: &str,
        _top_k: usize,
    ) -> Result<Vec<PassageMatch>, RagError> {
        if self.matches.is_empty() {
            return Err(RagError::NoMatches);
        }
        Ok(self.matches.clone())
    }
}

struct Harness {
    orchestrator: Orchestrator,
    messages: Arc<InMemoryMessageStore>,
    customers: Arc<InMemoryCustomerStore>,
    events: Arc<InMemoryEventStore>,
}

fn harness(backend: ScriptedBackend, retriever: ScriptedRetriever) -> Harness {
    let backend: Arc<dyn CompletionBackend> = Arc::new(backend);
    let retriever: Arc<dyn PassageRetriever> = Arc::new(retriever);

    let messages = Arc::new(InMemoryMessageStore::new());
    let customers = Arc::new(InMemoryCustomerStore::new());
    let events = Arc::new(InMemoryEventStore::new());

    let handlers = HandlerRegistry::new(
        Arc::new(ProductQaHandler::new(backend.clone(), retriever, 3)),
        Arc::new(ScheduleDemoHandler::new(
            backend.clone(),
            customers.clone(),
            events.clone(),
        )),
    );

    let orchestrator = Orchestrator::new(
        Arc::new(ConversationGraph::builtin()),
        InputAnalyzer::new(backend),
        handlers,
        messages.clone(),
        customers.clone(),
    );

    Harness {
        orchestrator,
        messages,
        customers,
        events,
    }
}

fn analysis_json(next: &str, inputs: serde_json::Value, suggestion: &str) -> String {
    serde_json::json!({
        "nextNodeId": next,
        "userInputs": inputs,
        "confidence": 0.9,
        "suggestedResponse": suggestion,
    })
    .to_string()
}

/// New connection: session starts at the welcome node with empty context
/// and the welcome text is persisted as an AI message.
#[tokio::test]
async fn start_session_emits_and_persists_welcome() {
    let h = harness(ScriptedBackend::default(), ScriptedRetriever::empty());

    let (session, welcome) = h.orchestrator.start_session("s1").await.unwrap();

    assert_eq!(session.current_node_id, "welcome");
    assert!(session.context.is_empty());
    assert!(welcome.contains("May I know your name?"));

    let saved = h.messages.messages_for_session("s1").await.unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].role, MessageRole::Ai);
    assert_eq!(saved[0].text, welcome);
}

/// A failed analysis call degrades to the deterministic fallback rather
/// than failing the turn.
#[tokio::test]
async fn backend_failure_falls_back_to_first_candidate() {
    let h = harness(
        ScriptedBackend::default().failing_completion(),
        ScriptedRetriever::empty(),
    );

    let session = SessionState::new("s1", "welcome");
    let turn = h.orchestrator.handle_message("Ana", None, &session).await.unwrap();

    // First candidate of the welcome node
    assert_eq!(turn.updated_session.current_node_id, "collect_email");
    assert_eq!(turn.updated_session.context.text("name"), Some("Ana"));
    assert!(!turn.response.is_empty());
    assert!(turn.persistence_error.is_none());
}

/// Email-shaped input is extracted as `email` in degraded mode.
#[tokio::test]
async fn fallback_extracts_email_token() {
    let h = harness(
        ScriptedBackend::default().failing_completion(),
        ScriptedRetriever::empty(),
    );

    let session = SessionState::new("s1", "collect_email");
    let turn = h
        .orchestrator
        .handle_message("it's ana@example.com", None, &session)
        .await
        .unwrap();

    assert_eq!(turn.updated_session.context.text("email"), Some("ana@example.com"));
    assert_eq!(turn.updated_session.current_node_id, "get_products");
}

/// Whitespace-only input still runs a full turn: no fields are extracted
/// but the user always gets a reply and the transcript is written.
#[tokio::test]
async fn whitespace_input_still_gets_a_reply() {
    let h = harness(
        ScriptedBackend::default().failing_completion(),
        ScriptedRetriever::empty(),
    );

    let session = SessionState::new("s1", "welcome");
    let turn = h.orchestrator.handle_message("   ", None, &session).await.unwrap();

    assert!(!turn.response.is_empty());
    assert_eq!(turn.updated_session.current_node_id, "collect_email");
    assert!(turn.updated_session.context.is_empty());

    let saved = h.messages.messages_for_session("s1").await.unwrap();
    assert_eq!(saved.len(), 2);
}

/// Client-supplied metadata rides along on the persisted user message.
#[tokio::test]
async fn message_metadata_is_persisted() {
    let h = harness(
        ScriptedBackend::default().completion(&analysis_json(
            "collect_email",
            serde_json::json!({"name": "Ana"}),
            "Nice to meet you!",
        )),
        ScriptedRetriever::empty(),
    );

    let session = SessionState::new("s1", "welcome");
    let metadata = serde_json::json!({"source": "chat_widget"});
    h.orchestrator
        .handle_message("Ana", Some(metadata.clone()), &session)
        .await
        .unwrap();

    let saved = h.messages.messages_for_session("s1").await.unwrap();
    let user_message = saved.iter().find(|m| m.role == MessageRole::User).unwrap();
    assert_eq!(user_message.metadata, Some(metadata));

    let ai_message = saved.iter().find(|m| m.role == MessageRole::Ai).unwrap();
    assert!(ai_message.metadata.is_none());
}

/// Context keys accumulate across turns; a turn never removes keys.
#[tokio::test]
async fn context_grows_monotonically() {
    let h = harness(
        ScriptedBackend::default()
            .completion(&analysis_json(
                "collect_email",
                serde_json::json!({"name": "Ana"}),
                "Nice to meet you!",
            ))
            .completion(&analysis_json(
                "get_products",
                serde_json::json!({"email": "a@x.com"}),
                "Which product interests you?",
            )),
        ScriptedRetriever::empty(),
    );

    let session = SessionState::new("s1", "welcome");
    let turn1 = h.orchestrator.handle_message("Ana", None, &session).await.unwrap();
    let keys1: Vec<String> = turn1.updated_session.context.keys().cloned().collect();

    let turn2 = h
        .orchestrator
        .handle_message("a@x.com", None, &turn1.updated_session)
        .await
        .unwrap();

    for key in keys1 {
        assert!(turn2.updated_session.context.contains_key(&key));
    }
    assert_eq!(turn2.updated_session.context.text("name"), Some("Ana"));
    assert_eq!(turn2.updated_session.context.text("email"), Some("a@x.com"));
}

/// User message is persisted before the assistant message, same session.
#[tokio::test]
async fn transcript_is_causally_ordered() {
    let h = harness(
        ScriptedBackend::default().completion(&analysis_json(
            "collect_email",
            serde_json::json!({"name": "Ana"}),
            "Nice to meet you, Ana!",
        )),
        ScriptedRetriever::empty(),
    );

    let session = SessionState::new("s1", "welcome");
    h.orchestrator.handle_message("Ana", None, &session).await.unwrap();

    let saved = h.messages.messages_for_session("s1").await.unwrap();
    assert_eq!(saved.len(), 2);
    assert_eq!(saved[0].role, MessageRole::User);
    assert_eq!(saved[1].role, MessageRole::Ai);
    assert!(saved[0].created_at <= saved[1].created_at);
    assert!(saved.iter().all(|m| m.session_id == "s1"));
}

/// product_qa consumes the handler output: the grounded answer replaces
/// the analyzer's suggestion entirely.
#[tokio::test]
async fn qa_handler_output_replaces_suggestion() {
    let h = harness(
        ScriptedBackend::default()
            .completion(&analysis_json(
                "product_qa",
                serde_json::json!({}),
                "Let me look that up for you.",
            ))
            .completion("EC2 offers resizable compute capacity in the cloud."),
        ScriptedRetriever::with_passage("Amazon EC2", "Resizable compute capacity."),
    );

    let mut session = SessionState::new("s1", "get_products");
    session.context.set("name", "Ana");
    session.context.set("email", "a@x.com");

    let turn = h
        .orchestrator
        .handle_message("what is EC2?", None, &session)
        .await
        .unwrap();

    assert_eq!(turn.updated_session.current_node_id, "product_qa");
    assert_eq!(
        turn.response,
        "EC2 offers resizable compute capacity in the cloud."
    );
}

/// Zero retrieval matches fails the handler; the user sees the generic
/// apology and the node transition is kept.
#[tokio::test]
async fn qa_no_match_degrades_to_apology() {
    let h = harness(
        ScriptedBackend::default().completion(&analysis_json(
            "product_qa",
            serde_json::json!({}),
            "",
        )),
        ScriptedRetriever::empty(),
    );

    let mut session = SessionState::new("s1", "get_products");
    session.context.set("name", "Ana");
    session.context.set("email", "a@x.com");

    let turn = h
        .orchestrator
        .handle_message("what is Fargate?", None, &session)
        .await
        .unwrap();

    assert_eq!(
        turn.response,
        "I'm sorry, I encountered an issue. Could you please try again?"
    );
    assert_eq!(turn.updated_session.current_node_id, "product_qa");
}

/// Demo scheduling writes the event and customer record and confirms
/// with the supplied name and date.
#[tokio::test]
async fn demo_scheduling_records_event_and_customer() {
    let h = harness(
        ScriptedBackend::default()
            .completion(&analysis_json("schedule_demo", serde_json::json!({}), ""))
            .tool_call(
                "schedule_demo",
                r#"{"name":"Ana","email":"a@x.com","productInterest":["EC2"],"date":"02-09-2026 15:00:00"}"#,
            ),
        ScriptedRetriever::empty(),
    );

    let mut session = SessionState::new("s1", "get_products");
    session.context.set("name", "Ana");
    session.context.set("email", "a@x.com");

    let turn = h
        .orchestrator
        .handle_message("tomorrow 3pm", None, &session)
        .await
        .unwrap();

    assert!(turn.response.contains("scheduled successfully"));
    assert!(turn.response.contains("Ana"));
    assert!(turn.response.contains("02-09-2026 15:00:00"));

    let events = h.events.events_by_name("s1", SCHEDULE_DEMO_EVENT).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].data["productInterest"][0], "EC2");

    let customer = h.customers.customer_for_session("s1").await.unwrap().unwrap();
    assert_eq!(customer.name, "Ana");
    assert_eq!(customer.email, "a@x.com");
    assert_eq!(customer.product_interest, vec!["EC2".to_string()]);
}

/// schedule_demo does not consume: a non-empty analyzer suggestion wins
/// over the handler's confirmation text.
#[tokio::test]
async fn demo_suggestion_takes_priority_when_present() {
    let h = harness(
        ScriptedBackend::default()
            .completion(&analysis_json(
                "schedule_demo",
                serde_json::json!({}),
                "Sure, let me set that up.",
            ))
            .tool_call(
                "schedule_demo",
                r#"{"name":"Ana","email":"a@x.com","productInterest":[],"date":"03-09-2026 10:00:00"}"#,
            ),
        ScriptedRetriever::empty(),
    );

    let mut session = SessionState::new("s1", "get_products");
    session.context.set("name", "Ana");
    session.context.set("email", "a@x.com");

    let turn = h
        .orchestrator
        .handle_message("book a demo", None, &session)
        .await
        .unwrap();

    assert_eq!(turn.response, "Sure, let me set that up.");
    // Side effects still happened
    let events = h.events.events_by_name("s1", SCHEDULE_DEMO_EVENT).await.unwrap();
    assert_eq!(events.len(), 1);
}

/// The provider declining the tool call fails the handler, not the turn.
#[tokio::test]
async fn declined_tool_call_degrades_to_apology() {
    let h = harness(
        ScriptedBackend::default()
            .completion(&analysis_json("schedule_demo", serde_json::json!({}), ""))
            .declined_tool_call(),
        ScriptedRetriever::empty(),
    );

    let mut session = SessionState::new("s1", "get_products");
    session.context.set("name", "Ana");
    session.context.set("email", "a@x.com");

    let turn = h
        .orchestrator
        .handle_message("book a demo", None, &session)
        .await
        .unwrap();

    assert_eq!(
        turn.response,
        "I'm sorry, I encountered an issue. Could you please try again?"
    );
    assert!(h
        .events
        .events_by_name("s1", SCHEDULE_DEMO_EVENT)
        .await
        .unwrap()
        .is_empty());
}

/// An analyzer choice outside the offered candidate list is clamped to
/// the first candidate.
#[tokio::test]
async fn out_of_candidate_choice_is_clamped() {
    let h = harness(
        ScriptedBackend::default().completion(&analysis_json(
            "end_conversation",
            serde_json::json!({}),
            "Bye!",
        )),
        ScriptedRetriever::empty(),
    );

    // end_conversation is not a candidate of welcome
    let session = SessionState::new("s1", "welcome");
    let turn = h.orchestrator.handle_message("hello", None, &session).await.unwrap();

    assert_eq!(turn.updated_session.current_node_id, "collect_email");
}

/// An unknown current node fails that turn only.
#[tokio::test]
async fn unknown_node_is_a_turn_error() {
    let h = harness(ScriptedBackend::default(), ScriptedRetriever::empty());

    let session = SessionState::new("s1", "no_such_node");
    let result = h.orchestrator.handle_message("hello", None, &session).await;
    assert!(result.is_err());
}

/// Name and email in context trigger the customer upsert after the turn.
#[tokio::test]
async fn complete_contact_details_upsert_customer() {
    let h = harness(
        ScriptedBackend::default().completion(&analysis_json(
            "get_products",
            serde_json::json!({"email": "a@x.com"}),
            "Great, which product?",
        )),
        ScriptedRetriever::empty(),
    );

    let mut session = SessionState::new("s1", "collect_email");
    session.context.set("name", "Ana");

    h.orchestrator
        .handle_message("a@x.com", None, &session)
        .await
        .unwrap();

    let customer = h.customers.customer_for_session("s1").await.unwrap().unwrap();
    assert_eq!(customer.name, "Ana");
    assert_eq!(customer.email, "a@x.com");
}
