//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Completion provider configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Retrieval configuration (embeddings + vector store)
    #[serde(default)]
    pub rag: RagConfig,

    /// Persistence configuration (ScyllaDB)
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP/WebSocket server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enforce CORS against `cors_origins` (disabled = permissive, dev only)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Maximum concurrently registered sessions
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Idle time before a session is evicted
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,

    /// Interval of the background cleanup task
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

fn default_port() -> u16 {
    3000
}

fn default_true() -> bool {
    true
}

fn default_max_sessions() -> usize {
    500
}

fn default_session_timeout_secs() -> u64 {
    3600
}

fn default_cleanup_interval_secs() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            cors_enabled: default_true(),
            cors_origins: Vec::new(),
            max_sessions: default_max_sessions(),
            session_timeout_secs: default_session_timeout_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

/// Completion provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions endpoint
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// API key; falls back to TOGETHER_API_KEY
    #[serde(default = "default_llm_api_key")]
    pub api_key: Option<String>,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Temperature for analysis/answer completions
    #[serde(default = "default_chat_temperature")]
    pub chat_temperature: f32,

    /// Temperature for function-calling requests
    #[serde(default)]
    pub tool_temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Per-request timeout; expiry is treated as a provider error
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry attempts for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_llm_endpoint() -> String {
    "https://api.together.xyz".to_string()
}

fn default_llm_api_key() -> Option<String> {
    std::env::var("TOGETHER_API_KEY").ok()
}

fn default_llm_model() -> String {
    "meta-llama/Meta-Llama-3.1-70B-Instruct-Turbo".to_string()
}

fn default_chat_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    5000
}

fn default_top_p() -> f32 {
    0.7
}

fn default_llm_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: default_llm_api_key(),
            model: default_llm_model(),
            chat_temperature: default_chat_temperature(),
            tool_temperature: 0.0,
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Disabled = product Q&A degrades to the apology path
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_qdrant_endpoint")]
    pub qdrant_endpoint: String,

    #[serde(default)]
    pub qdrant_api_key: Option<String>,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default = "default_vector_dim")]
    pub vector_dim: usize,

    /// Remote embedding API endpoint
    #[serde(default = "default_embedding_endpoint")]
    pub embedding_endpoint: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Passages retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_qdrant_endpoint() -> String {
    "http://localhost:6334".to_string()
}

fn default_collection() -> String {
    "product_knowledge".to_string()
}

fn default_vector_dim() -> usize {
    1024
}

fn default_embedding_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "multilingual-e5-large".to_string()
}

fn default_top_k() -> usize {
    3
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            qdrant_endpoint: default_qdrant_endpoint(),
            qdrant_api_key: None,
            collection: default_collection(),
            vector_dim: default_vector_dim(),
            embedding_endpoint: default_embedding_endpoint(),
            embedding_model: default_embedding_model(),
            top_k: default_top_k(),
        }
    }
}

/// Persistence configuration for ScyllaDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Enable ScyllaDB persistence (false = in-memory stores)
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_scylla_hosts")]
    pub scylla_hosts: Vec<String>,

    #[serde(default = "default_scylla_keyspace")]
    pub keyspace: String,

    #[serde(default = "default_replication_factor")]
    pub replication_factor: u8,
}

fn default_scylla_hosts() -> Vec<String> {
    std::env::var("SCYLLA_HOSTS")
        .map(|s| s.split(',').map(|h| h.trim().to_string()).collect())
        .unwrap_or_else(|_| vec!["127.0.0.1:9042".to_string()])
}

fn default_scylla_keyspace() -> String {
    std::env::var("SCYLLA_KEYSPACE").unwrap_or_else(|_| "sales_agent".to_string())
}

fn default_replication_factor() -> u8 {
    1
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scylla_hosts: default_scylla_hosts(),
            keyspace: default_scylla_keyspace(),
            replication_factor: default_replication_factor(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON-formatted logs
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings before startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rag.enabled && self.rag.vector_dim == 0 {
            return Err(ConfigError::Invalid(
                "rag.vector_dim must be non-zero".to_string(),
            ));
        }
        if self.rag.top_k == 0 {
            return Err(ConfigError::Invalid("rag.top_k must be non-zero".to_string()));
        }
        if self.server.max_sessions == 0 {
            return Err(ConfigError::Invalid(
                "server.max_sessions must be non-zero".to_string(),
            ));
        }
        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "llm.timeout_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load settings from config files and environment.
///
/// Priority: env vars (`SALES_AGENT__SECTION__KEY`) > `config/{env}.yaml`
/// > `config/default.yaml` > struct defaults.
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    let default_path = Path::new("config/default.yaml");
    if default_path.exists() {
        builder = builder.add_source(File::from(default_path));
    }

    if let Some(env_name) = env {
        let env_path_string = format!("config/{}.yaml", env_name);
        let env_path = Path::new(&env_path_string);
        if env_path.exists() {
            builder = builder.add_source(File::from(env_path));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("SALES_AGENT")
            .separator("__")
            .try_parsing(true),
    );

    let settings: Settings = builder.build()?.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.rag.top_k, 3);
    }

    #[test]
    fn zero_top_k_rejected() {
        let mut settings = Settings::default();
        settings.rag.top_k = 0;
        assert!(settings.validate().is_err());
    }
}
