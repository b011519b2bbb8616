//! Chat messages and tool definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Callable tool, with JSON Schema parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A tool invocation returned by the provider.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub name: String,
    /// Raw JSON arguments string, parsed by the caller.
    pub arguments: String,
}

/// Builder for `ToolDefinition` with JSON Schema parameters.
///
/// # Example
/// ```
/// use sales_agent_llm::ToolBuilder;
///
/// let tool = ToolBuilder::new("schedule_demo", "Schedule a demo with the customer")
///     .param("name", "string", "Customer's name", true)
///     .array_param("product_interest", "string", "Products of interest", true)
///     .build();
/// assert_eq!(tool.name, "schedule_demo");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ToolBuilder {
    name: String,
    description: String,
    properties: serde_json::Map<String, serde_json::Value>,
    required: Vec<String>,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            properties: serde_json::Map::new(),
            required: Vec::new(),
        }
    }

    /// Add a scalar parameter.
    pub fn param(
        mut self,
        name: impl Into<String>,
        param_type: &str,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        let name = name.into();
        let mut prop = serde_json::Map::new();
        prop.insert(
            "type".to_string(),
            serde_json::Value::String(param_type.to_string()),
        );
        prop.insert(
            "description".to_string(),
            serde_json::Value::String(description.into()),
        );
        self.properties
            .insert(name.clone(), serde_json::Value::Object(prop));
        if required {
            self.required.push(name);
        }
        self
    }

    /// Add an array parameter with the given item type.
    pub fn array_param(
        mut self,
        name: impl Into<String>,
        item_type: &str,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        let name = name.into();
        let prop = serde_json::json!({
            "type": "array",
            "items": { "type": item_type },
            "description": description.into(),
        });
        self.properties.insert(name.clone(), prop);
        if required {
            self.required.push(name);
        }
        self
    }

    pub fn build(self) -> ToolDefinition {
        let parameters = serde_json::json!({
            "type": "object",
            "properties": self.properties,
            "required": self.required,
        });
        ToolDefinition::new(self.name, self.description, parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_json_schema() {
        let tool = ToolBuilder::new("schedule_demo", "Schedule a demo")
            .param("name", "string", "Customer's name", true)
            .param("email", "string", "Customer's email", true)
            .array_param("product_interest", "string", "Products of interest", true)
            .param("date", "string", "Demo date", false)
            .build();

        let required = tool.parameters["required"].as_array().unwrap();
        assert_eq!(required.len(), 3);
        assert_eq!(tool.parameters["properties"]["product_interest"]["type"], "array");
    }
}
