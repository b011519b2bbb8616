//! Conversation graph
//!
//! A static registry of conversation nodes, built once at startup and
//! read-only at runtime. Each node declares its own candidate successors;
//! the orchestrator offers those candidates to the analyzer but never
//! enforces them as hard edges. Handlers are referenced by kind, keeping
//! the graph pure data.

use once_cell::sync::Lazy;
use regex::Regex;
use sales_agent_core::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{(\w+)\}").expect("valid placeholder regex"));

/// Which built-in handler a node runs after a transition into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    ProductQa,
    ScheduleDemo,
}

/// One step in the conversation graph. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub description: String,
    pub prompt_template: String,
    /// Context keys that should be present before this node is fully
    /// meaningful. Advisory only; the analyzer is asked to follow up on
    /// missing fields but no gate enforces them.
    pub required_fields: Vec<String>,
    /// Candidate successors offered to the analyzer.
    pub next_node_ids: Vec<String>,
    /// When true, a handler's output replaces the analyzer's suggested
    /// reply; when false it is only a fallback for an empty suggestion.
    pub consume_response: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler: Option<HandlerKind>,
}

impl Node {
    fn basic(
        id: &str,
        description: &str,
        prompt_template: &str,
        required_fields: &[&str],
        next_node_ids: &[&str],
    ) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            prompt_template: prompt_template.to_string(),
            required_fields: required_fields.iter().map(|s| s.to_string()).collect(),
            next_node_ids: next_node_ids.iter().map(|s| s.to_string()).collect(),
            consume_response: false,
            handler: None,
        }
    }

    fn with_handler(
        id: &str,
        description: &str,
        prompt_template: &str,
        required_fields: &[&str],
        next_node_ids: &[&str],
        consume_response: bool,
        handler: HandlerKind,
    ) -> Self {
        Self {
            consume_response,
            handler: Some(handler),
            ..Self::basic(id, description, prompt_template, required_fields, next_node_ids)
        }
    }

    /// Resolve `${field}` placeholders against the context. Unknown
    /// placeholders are left verbatim so a missing name never produces
    /// an empty greeting.
    pub fn render_prompt(&self, context: &Context) -> String {
        PLACEHOLDER_RE
            .replace_all(&self.prompt_template, |caps: &regex::Captures<'_>| {
                match context.get(&caps[1]) {
                    Some(value) => value.render(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Terminal nodes offer no candidates.
    pub fn is_terminal(&self) -> bool {
        self.next_node_ids.is_empty()
    }
}

/// Read-only node lookup. Built once; safe for unrestricted concurrent reads.
#[derive(Debug, Clone)]
pub struct ConversationGraph {
    nodes: HashMap<String, Node>,
    entry_node_id: String,
}

impl ConversationGraph {
    pub const ENTRY_NODE_ID: &'static str = "welcome";

    /// The hand-authored sales conversation graph.
    pub fn builtin() -> Self {
        let nodes = vec![
            Node::basic(
                "welcome",
                "Welcome message",
                "Hello! I'm your sales assistant. May I know your name?",
                &[],
                &["collect_email", "get_products", "product_qa"],
            ),
            Node::basic(
                "collect_name",
                "Collect name from user",
                "Nice to meet you, ${name}! What's your email address?",
                &[],
                &["collect_email", "get_products", "product_qa"],
            ),
            Node::basic(
                "collect_email",
                "Collect email from user",
                "Nice to meet you, ${name}! What's your email address?",
                &["name"],
                &["get_products"],
            ),
            Node::basic(
                "get_products",
                "Get product details from user",
                "What product are you interested in? We offer:\n\
                 1. Amazon EC2 (Elastic Compute Cloud)\n\
                 2. Amazon S3 (Simple Storage Service)\n\
                 3. Amazon RDS (Relational Database Service)\n\
                 4. Amazon DynamoDB\n\
                 5. Amazon Lambda (Function as a Service)",
                &["name", "email"],
                &["product_qa", "schedule_demo"],
            ),
            Node::with_handler(
                "product_qa",
                "Answers any questions about the product, using retrieval",
                "",
                &["name", "email"],
                &["schedule_demo", "end_conversation", "product_qa"],
                true,
                HandlerKind::ProductQa,
            ),
            Node::with_handler(
                "schedule_demo",
                "Schedule a demo with the user",
                "success example: I've scheduled a demo for you on {date} at {time}. \
                 I'll send you a confirmation email to {email} shortly for the same.\n\
                 failure example: Please provide your name and email so I can schedule the demo.",
                &["name", "email"],
                &["end_conversation", "product_qa", "collect_name", "collect_email"],
                false,
                HandlerKind::ScheduleDemo,
            ),
            Node::basic(
                "end_conversation",
                "End the conversation",
                "Thank you for using our service. Have a great day!",
                &[],
                &[],
            ),
        ];

        Self::from_nodes(nodes, Self::ENTRY_NODE_ID)
    }

    pub fn from_nodes(nodes: Vec<Node>, entry_node_id: &str) -> Self {
        let nodes: HashMap<String, Node> =
            nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        debug_assert!(nodes.contains_key(entry_node_id));

        Self {
            nodes,
            entry_node_id: entry_node_id.to_string(),
        }
    }

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn entry_node(&self) -> &Node {
        // from_nodes checks the entry id at construction time
        &self.nodes[&self.entry_node_id]
    }

    pub fn entry_node_id(&self) -> &str {
        &self.entry_node_id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_graph_is_closed() {
        let graph = ConversationGraph::builtin();
        for id in [
            "welcome",
            "collect_name",
            "collect_email",
            "get_products",
            "product_qa",
            "schedule_demo",
            "end_conversation",
        ] {
            let node = graph.get_node(id).unwrap();
            for next in &node.next_node_ids {
                assert!(graph.get_node(next).is_some(), "{} -> {} dangles", id, next);
            }
        }
    }

    #[test]
    fn node_lookup_is_stable() {
        let graph = ConversationGraph::builtin();
        let a = graph.get_node("welcome").unwrap().clone();
        let b = graph.get_node("welcome").unwrap();
        assert_eq!(a.prompt_template, b.prompt_template);
        assert_eq!(a.next_node_ids, b.next_node_ids);
    }

    #[test]
    fn end_conversation_is_terminal() {
        let graph = ConversationGraph::builtin();
        assert!(graph.get_node("end_conversation").unwrap().is_terminal());
        assert!(!graph.get_node("welcome").unwrap().is_terminal());
    }

    #[test]
    fn render_prompt_resolves_known_placeholders() {
        let graph = ConversationGraph::builtin();
        let node = graph.get_node("collect_email").unwrap();

        let mut context = Context::new();
        context.set("name", "Ana");
        assert_eq!(
            node.render_prompt(&context),
            "Nice to meet you, Ana! What's your email address?"
        );

        // Unknown placeholders stay verbatim
        let empty = Context::new();
        assert_eq!(
            node.render_prompt(&empty),
            "Nice to meet you, ${name}! What's your email address?"
        );
    }

    #[test]
    fn qa_node_consumes_handler_response_demo_node_does_not() {
        let graph = ConversationGraph::builtin();
        let qa = graph.get_node("product_qa").unwrap();
        assert!(qa.consume_response);
        assert_eq!(qa.handler, Some(HandlerKind::ProductQa));

        let demo = graph.get_node("schedule_demo").unwrap();
        assert!(!demo.consume_response);
        assert_eq!(demo.handler, Some(HandlerKind::ScheduleDemo));
    }
}
