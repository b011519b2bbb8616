//! Product passage retrieval
//!
//! Combines the embedder and vector store: text query in, ranked passages
//! out, plus the upsert path used when seeding reference content.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::embeddings::{Embedder, EmbeddingInput};
use crate::vector_store::{StoredPassage, VectorStore};
use crate::RagError;

/// A passage to seed into the store.
#[derive(Debug, Clone)]
pub struct PassageItem {
    pub id: String,
    pub text: String,
    pub metadata: HashMap<String, String>,
}

/// A retrieved passage with similarity score.
#[derive(Debug, Clone)]
pub struct PassageMatch {
    pub score: f32,
    pub text: String,
    pub metadata: HashMap<String, String>,
}

/// Text-in, ranked-passages-out retrieval boundary.
#[async_trait]
pub trait PassageRetriever: Send + Sync {
    async fn search_by_text(
        &self,
        question: &str,
        top_k: usize,
    ) -> Result<Vec<PassageMatch>, RagError>;
}

/// Retrieval front-end for product Q&A.
pub struct ProductRetriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<VectorStore>,
}

impl ProductRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Embed and upsert passages in one call (seeding path).
    pub async fn upsert_texts(&self, items: Vec<PassageItem>) -> Result<(), RagError> {
        if items.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = items.iter().map(|item| item.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts, EmbeddingInput::Passage).await?;

        let passages: Vec<StoredPassage> = items
            .into_iter()
            .map(|item| StoredPassage {
                id: item.id,
                text: item.text,
                metadata: item.metadata,
            })
            .collect();

        self.store.upsert(&passages, &embeddings).await
    }

    /// Format matches into the context block fed to the grounded completion.
    pub fn format_context(matches: &[PassageMatch]) -> String {
        matches
            .iter()
            .map(|m| {
                let field = |key: &str| m.metadata.get(key).map(String::as_str).unwrap_or("");
                format!(
                    "Product: {}\nCategory: {}\nSection: {}\nDetails: {}",
                    field("product_name"),
                    field("category"),
                    field("section"),
                    m.text,
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[async_trait]
impl PassageRetriever for ProductRetriever {
    /// Embed a question and search for the most similar stored passages.
    ///
    /// Fails with `RagError::NoMatches` when the store returns nothing.
    async fn search_by_text(
        &self,
        question: &str,
        top_k: usize,
    ) -> Result<Vec<PassageMatch>, RagError> {
        let vectors = self
            .embedder
            .embed(&[question.to_string()], EmbeddingInput::Query)
            .await?;
        let query_vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("No embedding returned for query".to_string()))?;

        let results = self.store.search(&query_vector, top_k).await?;

        if results.is_empty() {
            tracing::warn!(question, "No matching passages found");
            return Err(RagError::NoMatches);
        }

        tracing::debug!(question, matches = results.len(), "Retrieved passages");

        Ok(results
            .into_iter()
            .map(|r| PassageMatch {
                score: r.score,
                text: r.text,
                metadata: r.metadata,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(product: &str, section: &str, text: &str) -> PassageMatch {
        let mut metadata = HashMap::new();
        metadata.insert("product_name".to_string(), product.to_string());
        metadata.insert("category".to_string(), "Compute".to_string());
        metadata.insert("section".to_string(), section.to_string());
        PassageMatch {
            score: 0.9,
            text: text.to_string(),
            metadata,
        }
    }

    #[test]
    fn context_block_includes_all_fields() {
        let matches = vec![
            passage("Amazon EC2", "Pricing", "On-demand billing per second."),
            passage("Amazon EC2", "Instances", "General purpose instance families."),
        ];

        let block = ProductRetriever::format_context(&matches);
        assert!(block.contains("Product: Amazon EC2"));
        assert!(block.contains("Section: Pricing"));
        assert!(block.contains("Details: On-demand billing per second."));
        assert_eq!(block.matches("Product:").count(), 2);
    }

    #[test]
    fn context_block_tolerates_missing_metadata() {
        let matches = vec![PassageMatch {
            score: 0.5,
            text: "Orphan passage".to_string(),
            metadata: HashMap::new(),
        }];

        let block = ProductRetriever::format_context(&matches);
        assert!(block.contains("Details: Orphan passage"));
    }
}
