//! Retrieval for product Q&A
//!
//! Features:
//! - Remote embedding generation (query/passage input modes)
//! - Dense vector search via Qdrant
//! - Product passage retrieval and context-block formatting

pub mod embeddings;
pub mod retriever;
pub mod vector_store;

pub use embeddings::{Embedder, EmbeddingInput, HttpEmbedder, HttpEmbedderConfig};
pub use retriever::{PassageItem, PassageMatch, PassageRetriever, ProductRetriever};
pub use vector_store::{VectorStore, VectorStoreConfig};

use thiserror::Error;

/// RAG errors
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("No matching content found")]
    NoMatches,

    #[error("Connection error: {0}")]
    Connection(String),
}

impl From<RagError> for sales_agent_core::Error {
    fn from(err: RagError) -> Self {
        sales_agent_core::Error::Rag(err.to_string())
    }
}
