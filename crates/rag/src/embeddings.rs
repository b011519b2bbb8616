//! Embedding generation
//!
//! Talks to a remote embedding API. Queries and passages use distinct input
//! modes; some embedding models produce asymmetric vectors for the two.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use sales_agent_config::RagConfig;

use crate::RagError;

/// How the text will be used, passed through to the embedding model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingInput {
    Query,
    Passage,
}

/// Embedding provider boundary.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts. Returns one vector per input, in order.
    async fn embed(
        &self,
        texts: &[String],
        input: EmbeddingInput,
    ) -> Result<Vec<Vec<f32>>, RagError>;

    /// Embedding dimension
    fn dim(&self) -> usize;
}

/// Remote embedder configuration
#[derive(Debug, Clone)]
pub struct HttpEmbedderConfig {
    pub endpoint: String,
    pub model: String,
    pub embedding_dim: usize,
}

impl Default for HttpEmbedderConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "multilingual-e5-large".to_string(),
            embedding_dim: 1024,
        }
    }
}

impl From<&RagConfig> for HttpEmbedderConfig {
    fn from(config: &RagConfig) -> Self {
        Self {
            endpoint: config.embedding_endpoint.clone(),
            model: config.embedding_model.clone(),
            embedding_dim: config.vector_dim,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    input_type: EmbeddingInput,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedder backed by a remote embedding API.
pub struct HttpEmbedder {
    client: Client,
    config: HttpEmbedderConfig,
}

impl HttpEmbedder {
    pub fn new(config: HttpEmbedderConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(
        &self,
        texts: &[String],
        input: EmbeddingInput,
    ) -> Result<Vec<Vec<f32>>, RagError> {
        let request = EmbedRequest {
            model: &self.config.model,
            input: texts,
            input_type: input,
        };

        let url = format!("{}/api/embed", self.config.endpoint);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("Embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!(
                "Embedding request failed: {} - {}",
                status, body
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("Failed to parse embedding response: {}", e)))?;

        if embed_response.embeddings.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embed_response.embeddings.len()
            )));
        }

        Ok(embed_response.embeddings)
    }

    fn dim(&self) -> usize {
        self.config.embedding_dim
    }
}
