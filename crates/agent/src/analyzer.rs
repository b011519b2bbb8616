//! Input analysis
//!
//! Classifies free-text user input against the current node's candidate
//! successors via the completion backend, constrained to a JSON shape.
//! A failed or malformed completion never reaches the orchestrator: the
//! analyzer degrades to a deterministic regex-based extraction with the
//! first candidate, so the conversation can't stall on a degraded backend.

use crate::graph::ConversationGraph;
use crate::prompts;
use once_cell::sync::Lazy;
use regex::Regex;
use sales_agent_core::Context;
use sales_agent_llm::backend::{CompletionBackend, CompletionOptions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("valid email regex")
});

const FALLBACK_RESPONSE: &str =
    "I apologize, but I encountered an issue. How can I help you?";

/// Result of analyzing one user turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputAnalysis {
    pub next_node_id: String,
    #[serde(default)]
    pub user_inputs: Context,
    pub confidence: f32,
    #[serde(default)]
    pub suggested_response: String,
}

/// Regex-only extraction used when the backend is unavailable: an
/// email-shaped token becomes `email`, otherwise the trimmed message
/// becomes `name`.
pub fn extract_basic_user_inputs(message: &str) -> Context {
    let mut inputs = Context::new();

    if let Some(email) = EMAIL_RE.find(message) {
        inputs.set("email", email.as_str());
    } else {
        let trimmed = message.trim();
        if !trimmed.is_empty() {
            inputs.set("name", trimmed);
        }
    }

    inputs
}

pub struct InputAnalyzer {
    backend: Arc<dyn CompletionBackend>,
}

impl InputAnalyzer {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Analyze a user turn against the candidate successors.
    ///
    /// Always returns an analysis: backend failures and malformed JSON
    /// degrade to the deterministic fallback, and a chosen node outside
    /// the offered candidate list is clamped to the first candidate.
    pub async fn analyze(
        &self,
        message: &str,
        history: &[String],
        context: &Context,
        graph: &ConversationGraph,
        candidate_ids: &[String],
    ) -> InputAnalysis {
        match self
            .analyze_strict(message, history, context, graph, candidate_ids)
            .await
        {
            Ok(analysis) => self.clamp_to_candidates(analysis, candidate_ids),
            Err(error) => {
                tracing::error!(%error, "Input analysis failed, using fallback");
                fallback_analysis(message, candidate_ids)
            }
        }
    }

    async fn analyze_strict(
        &self,
        message: &str,
        history: &[String],
        context: &Context,
        graph: &ConversationGraph,
        candidate_ids: &[String],
    ) -> Result<InputAnalysis, sales_agent_core::Error> {
        let candidates: Vec<_> = candidate_ids
            .iter()
            .filter_map(|id| graph.get_node(id))
            .collect();

        let options = CompletionOptions::json_schema(prompts::analysis_response_schema());
        let content = self
            .backend
            .complete(
                prompts::ANALYSIS_SYSTEM_PROMPT,
                &prompts::analysis_user_prompt(message, history, context, &candidates),
                &options,
            )
            .await
            .map_err(|e| sales_agent_core::Error::Llm(e.to_string()))?;

        let analysis: InputAnalysis = serde_json::from_str(&content)
            .map_err(|e| sales_agent_core::Error::Agent(format!("Malformed analysis: {}", e)))?;

        tracing::info!(
            next_node_id = %analysis.next_node_id,
            confidence = analysis.confidence,
            "Analysis completed"
        );

        Ok(analysis)
    }

    /// A chosen node id outside the candidate list is clamped to the first
    /// candidate rather than trusted, so the graph's offered successors
    /// stay meaningful.
    fn clamp_to_candidates(
        &self,
        mut analysis: InputAnalysis,
        candidate_ids: &[String],
    ) -> InputAnalysis {
        if candidate_ids.is_empty() {
            return analysis;
        }

        if !candidate_ids.contains(&analysis.next_node_id) {
            tracing::warn!(
                chosen = %analysis.next_node_id,
                clamped_to = %candidate_ids[0],
                "Analyzer chose a node outside the candidate list"
            );
            analysis.next_node_id = candidate_ids[0].clone();
        }

        analysis
    }
}

/// Deterministic degraded-mode analysis: first candidate, regex extraction,
/// fixed confidence, generic apology.
pub fn fallback_analysis(message: &str, candidate_ids: &[String]) -> InputAnalysis {
    InputAnalysis {
        next_node_id: candidate_ids.first().cloned().unwrap_or_default(),
        user_inputs: extract_basic_user_inputs(message),
        confidence: 0.5,
        suggested_response: FALLBACK_RESPONSE.to_string(),
    }
}
