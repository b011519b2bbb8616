//! Prompt templates for analysis, demo scheduling and product Q&A

use crate::graph::Node;
use sales_agent_core::Context;
use sales_agent_llm::prompt::{ToolBuilder, ToolDefinition};

pub const ANALYSIS_SYSTEM_PROMPT: &str =
    "You are a sales assistant. Analyze user input and determine next steps. \
     Only respond in JSON format.";

pub const PRODUCT_DETAILS_SYSTEM_PROMPT: &str =
    "You are an AWS product expert. Using ONLY the provided AWS product information, \
     answer the customer's question. If the information is not in the provided context, \
     acknowledge that you don't have that specific information. \
     Keep responses focused and technical.";

/// JSON schema the analyzer constrains the completion to.
pub fn analysis_response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "nextNodeId": {
                "type": "string",
                "description": "The next node id from the possible next nodes list"
            },
            "userInputs": {
                "type": "object",
                "description": "Any identified user inputs from the user input"
            },
            "confidence": {
                "type": "number",
                "minimum": 0,
                "maximum": 1,
                "description": "Confidence score between 0 and 1"
            },
            "suggestedResponse": {
                "type": "string",
                "description": "Suggested response to the user"
            }
        },
        "required": ["nextNodeId", "userInputs", "confidence", "suggestedResponse"]
    })
}

pub fn analysis_user_prompt(
    message: &str,
    history: &[String],
    context: &Context,
    candidates: &[&Node],
) -> String {
    let context_json = serde_json::to_string(context).unwrap_or_else(|_| "{}".to_string());
    let nodes_json = serde_json::to_string(candidates).unwrap_or_else(|_| "[]".to_string());

    format!(
        "Analyze the following user input and determine the next node. \
         If the required fields are not met, add follow up questions to the user.\n\
         user details: {}\n\n\
         User Input: {}\n\
         History: {}\n\
         Possible next nodes: {}",
        context_json,
        message,
        history.join("\n"),
        nodes_json
    )
}

/// The single callable tool offered during demo scheduling.
pub fn demo_tool() -> ToolDefinition {
    ToolBuilder::new("schedule_demo", "Schedule a demo with the customer")
        .param("name", "string", "Customer's name", true)
        .param("email", "string", "Customer's email", true)
        .array_param(
            "productInterest",
            "string",
            "Products user is interested in or has asked about",
            true,
        )
        .param(
            "date",
            "string",
            "It should be in the format of DD-MM-YYYY HH:MM:SS, if no date is mentioned schedule tomorrow",
            true,
        )
        .build()
}

pub fn demo_system_prompt(tool: &ToolDefinition) -> String {
    let schema_json = serde_json::to_string(tool).unwrap_or_else(|_| "{}".to_string());
    format!(
        "You have access to the following function:\n\
         Use the function '{}' to '{}':\n\
         {}\n\
         Schedule a demo for tomorrow using the context provided. \
         Format the date as YYYY-MM-DDTHH:MM:SS.",
        tool.name, tool.description, schema_json
    )
}

pub fn demo_user_prompt(context: &Context, history: &[String], input: &str) -> String {
    let context_json = serde_json::to_string(context).unwrap_or_else(|_| "{}".to_string());
    format!(
        "Schedule a demo for customer with context: {}\n\
         history: {}\n\
         user input: {}",
        context_json,
        history.join("\n"),
        input
    )
}

pub fn product_details_user_prompt(product_info: &str, question: &str) -> String {
    format!(
        "Retrieved AWS Product Information:\n\
         {}\n\
         Customer Question: {}\n\
         Provide a clear and technical response based solely on the retrieved product information above.",
        product_info, question
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ConversationGraph;

    #[test]
    fn analysis_prompt_carries_candidates_and_context() {
        let graph = ConversationGraph::builtin();
        let welcome = graph.get_node("welcome").unwrap();
        let mut context = Context::new();
        context.set("name", "Ana");

        let prompt = analysis_user_prompt(
            "my email is a@x.com",
            &["AI: Hello!".to_string()],
            &context,
            &[welcome],
        );

        assert!(prompt.contains("my email is a@x.com"));
        assert!(prompt.contains(r#""name":"Ana""#));
        assert!(prompt.contains("welcome"));
        assert!(prompt.contains("AI: Hello!"));
    }

    #[test]
    fn demo_tool_declares_all_parameters() {
        let tool = demo_tool();
        assert_eq!(tool.name, "schedule_demo");
        let props = &tool.parameters["properties"];
        for key in ["name", "email", "productInterest", "date"] {
            assert!(props.get(key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn analysis_schema_requires_all_fields() {
        let schema = analysis_response_schema();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 4);
    }
}
