//! Completion backend implementations
//!
//! `TogetherBackend` talks to any OpenAI-compatible chat completions API.
//! Transient failures (5xx, network, timeout) are retried with exponential
//! backoff; 4xx responses are not.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use sales_agent_config::LlmConfig;

use crate::prompt::{Message, ToolCall, ToolDefinition};
use crate::LlmError;

/// Per-call options for a completion request.
///
/// Unset fields fall back to the backend's configured sampling parameters,
/// so callers only override what they need.
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    /// Structured-output constraint, passed through as `response_format`.
    pub response_format: Option<serde_json::Value>,
}

impl CompletionOptions {
    /// Constrain the response to a JSON schema.
    pub fn json_schema(schema: serde_json::Value) -> Self {
        Self {
            response_format: Some(serde_json::json!({
                "type": "json_object",
                "schema": schema,
            })),
            ..Self::default()
        }
    }
}

/// Completion provider boundary.
///
/// The provider is an opaque request/response service; retry and rate-limit
/// internals live behind this trait.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Plain chat completion; returns the assistant's text.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, LlmError>;

    /// Function-calling completion. Returns `None` when the provider declines
    /// to call any of the offered tools.
    async fn complete_with_tools(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<Option<ToolCall>, LlmError>;

    /// Model name
    fn model_name(&self) -> &str;
}

/// Backend configuration
#[derive(Debug, Clone)]
pub struct TogetherConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    /// Temperature for plain chat requests
    pub chat_temperature: f32,
    /// Temperature for tool-calling requests
    pub tool_temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

impl Default for TogetherConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.together.xyz".to_string(),
            api_key: None,
            model: "meta-llama/Meta-Llama-3.1-70B-Instruct-Turbo".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
            initial_backoff: Duration::from_millis(100),
            chat_temperature: 0.3,
            tool_temperature: 0.0,
            max_tokens: 5000,
            top_p: 0.7,
        }
    }
}

impl From<&LlmConfig> for TogetherConfig {
    fn from(config: &LlmConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(100),
            chat_temperature: config.chat_temperature,
            tool_temperature: config.tool_temperature,
            max_tokens: config.max_tokens,
            top_p: config.top_p,
        }
    }
}

/// OpenAI-compatible chat backend
#[derive(Clone)]
pub struct TogetherBackend {
    client: Client,
    config: TogetherConfig,
}

impl TogetherBackend {
    pub fn new(config: TogetherConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn api_url(&self) -> String {
        format!("{}/v1/chat/completions", self.config.endpoint)
    }

    fn chat_request(&self, system_prompt: &str, user_prompt: &str, options: &CompletionOptions) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![Message::system(system_prompt), Message::user(user_prompt)],
            temperature: options.temperature.unwrap_or(self.config.chat_temperature),
            max_tokens: options.max_tokens.unwrap_or(self.config.max_tokens),
            top_p: options.top_p.unwrap_or(self.config.top_p),
            response_format: options.response_format.clone(),
            tools: None,
        }
    }

    fn is_retryable(error: &LlmError) -> bool {
        matches!(error, LlmError::Network(_) | LlmError::Timeout)
    }

    async fn execute_request(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let mut builder = self.client.post(self.api_url()).json(request);
        if let Some(ref key) = self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            // 5xx is retryable, 4xx is not
            if status.is_server_error() {
                return Err(LlmError::Network(format!("Server error {}: {}", status, body)));
            }
            return Err(LlmError::Api(format!("{}: {}", status, body)));
        }

        Ok(response.json().await?)
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let mut last_error = None;
        let mut backoff = self.config.initial_backoff;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::warn!(
                    attempt,
                    max_retries = self.config.max_retries,
                    "Completion request failed, retrying in {:?}",
                    backoff
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }

            match self.execute_request(&request).await {
                Ok(response) => return Ok(response),
                Err(e) if Self::is_retryable(&e) => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::Network("Max retries exceeded".to_string())))
    }
}

#[async_trait]
impl CompletionBackend for TogetherBackend {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        let request = self.chat_request(system_prompt, user_prompt, options);

        let response = self.chat(request).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

        match choice.message.content {
            Some(content) if !content.is_empty() => {
                tracing::debug!(model = %self.config.model, "Chat completion successful");
                Ok(content)
            }
            _ => Err(LlmError::InvalidResponse(
                "Empty completion content".to_string(),
            )),
        }
    }

    async fn complete_with_tools(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<Option<ToolCall>, LlmError> {
        let wire_tools: Vec<WireTool> = tools
            .iter()
            .map(|t| WireTool {
                tool_type: "function".to_string(),
                function: t.clone(),
            })
            .collect();

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![Message::system(system_prompt), Message::user(user_prompt)],
            temperature: self.config.tool_temperature,
            max_tokens: self.config.max_tokens,
            top_p: self.config.top_p,
            response_format: None,
            tools: Some(wire_tools),
        };

        let response = self.chat(request).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

        let call = choice
            .message
            .tool_calls
            .and_then(|calls| calls.into_iter().next())
            .map(|c| ToolCall {
                name: c.function.name,
                arguments: c.function.arguments,
            });

        tracing::debug!(
            model = %self.config.model,
            has_tool_call = call.is_some(),
            "Function call completed"
        );

        Ok(call)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// Wire types for the OpenAI-compatible API

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: ToolDefinition,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    function: WireFunctionCall,
}

#[derive(Debug, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_with_tool_call_parses() {
        let json = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "function": {
                            "name": "schedule_demo",
                            "arguments": "{\"name\":\"Ana\"}"
                        }
                    }]
                }
            }]
        }"#;

        let response: ChatResponse = serde_json::from_str(json).unwrap();
        let calls = response.choices[0].message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "schedule_demo");
    }

    #[test]
    fn config_from_settings() {
        let llm = sales_agent_config::LlmConfig::default();
        let config = TogetherConfig::from(&llm);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.tool_temperature, 0.0);
    }

    #[test]
    fn sampling_settings_reach_the_config() {
        let mut llm = sales_agent_config::LlmConfig::default();
        llm.chat_temperature = 0.9;
        llm.max_tokens = 128;
        llm.top_p = 0.5;

        let config = TogetherConfig::from(&llm);
        assert_eq!(config.chat_temperature, 0.9);
        assert_eq!(config.max_tokens, 128);
        assert_eq!(config.top_p, 0.5);
    }

    #[test]
    fn default_options_use_configured_sampling() {
        let config = TogetherConfig {
            chat_temperature: 0.9,
            max_tokens: 128,
            top_p: 0.5,
            ..TogetherConfig::default()
        };
        let backend = TogetherBackend::new(config).unwrap();

        let request = backend.chat_request("sys", "user", &CompletionOptions::default());
        assert_eq!(request.temperature, 0.9);
        assert_eq!(request.max_tokens, 128);
        assert_eq!(request.top_p, 0.5);
    }

    #[test]
    fn per_call_options_override_configured_sampling() {
        let backend = TogetherBackend::new(TogetherConfig::default()).unwrap();

        let options = CompletionOptions {
            temperature: Some(0.0),
            ..CompletionOptions::default()
        };
        let request = backend.chat_request("sys", "user", &options);
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.max_tokens, 5000);
    }
}
