//! Vector store using Qdrant
//!
//! Dense storage and similarity search for product passages.

use qdrant_client::{
    qdrant::{
        value::Kind, CreateCollectionBuilder, DeletePointsBuilder, Distance, PointId, PointStruct,
        PointsIdsList, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
    },
    Qdrant,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use sales_agent_config::RagConfig;

use crate::RagError;

/// Vector store configuration
#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    /// Qdrant endpoint
    pub endpoint: String,
    /// Collection name
    pub collection: String,
    /// Vector dimension
    pub vector_dim: usize,
    /// API key (optional)
    pub api_key: Option<String>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:6334".to_string(),
            collection: "product_knowledge".to_string(),
            vector_dim: 1024,
            api_key: None,
        }
    }
}

impl From<&RagConfig> for VectorStoreConfig {
    fn from(config: &RagConfig) -> Self {
        Self {
            endpoint: config.qdrant_endpoint.clone(),
            collection: config.collection.clone(),
            vector_dim: config.vector_dim,
            api_key: config.qdrant_api_key.clone(),
        }
    }
}

/// A stored product passage with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPassage {
    /// Unique ID
    pub id: String,
    /// Passage text
    pub text: String,
    /// Metadata (product_name, category, section, ...)
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Search hit from the vector store.
#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    pub id: String,
    /// Similarity score
    pub score: f32,
    pub text: String,
    pub metadata: HashMap<String, String>,
}

/// Vector store client
pub struct VectorStore {
    client: Qdrant,
    config: VectorStoreConfig,
}

impl VectorStore {
    /// Create a new vector store connection.
    pub async fn new(config: VectorStoreConfig) -> Result<Self, RagError> {
        let mut builder = Qdrant::from_url(&config.endpoint);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
            tracing::info!("Qdrant connection using API key authentication");
        }

        let client = builder
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create the collection if it does not exist.
    pub async fn ensure_collection(&self) -> Result<(), RagError> {
        let exists = self
            .client
            .collection_exists(&self.config.collection)
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.config.collection).vectors_config(
                        VectorParamsBuilder::new(self.config.vector_dim as u64, Distance::Cosine),
                    ),
                )
                .await
                .map_err(|e| RagError::VectorStore(e.to_string()))?;
        }

        Ok(())
    }

    /// Insert passages with their embeddings.
    pub async fn upsert(
        &self,
        passages: &[StoredPassage],
        embeddings: &[Vec<f32>],
    ) -> Result<(), RagError> {
        if passages.len() != embeddings.len() {
            return Err(RagError::VectorStore(
                "Passage and embedding count mismatch".to_string(),
            ));
        }

        let points: Vec<PointStruct> = passages
            .iter()
            .zip(embeddings.iter())
            .map(|(passage, emb)| {
                let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
                payload.insert("text".to_string(), passage.text.clone().into());
                for (k, v) in &passage.metadata {
                    payload.insert(k.clone(), v.clone().into());
                }
                PointStruct::new(passage.id.clone(), emb.clone(), payload)
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.config.collection, points))
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        tracing::info!(
            collection = %self.config.collection,
            count = passages.len(),
            "Passages upserted"
        );

        Ok(())
    }

    /// Similarity search by vector.
    pub async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorSearchResult>, RagError> {
        let search_builder = SearchPointsBuilder::new(
            &self.config.collection,
            query_embedding.to_vec(),
            top_k as u64,
        )
        .with_payload(true);

        let results = self
            .client
            .search_points(search_builder)
            .await
            .map_err(|e| RagError::Search(e.to_string()))?;

        let search_results: Vec<VectorSearchResult> = results
            .result
            .into_iter()
            .map(|point| {
                let mut metadata = HashMap::new();
                let mut text = String::new();

                for (k, v) in point.payload {
                    if let Some(Kind::StringValue(s)) = v.kind {
                        if k == "text" {
                            text = s;
                        } else {
                            metadata.insert(k, s);
                        }
                    }
                }

                let id = point
                    .id
                    .map(|pid| match pid.point_id_options {
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u)) => u,
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => {
                            n.to_string()
                        }
                        None => String::new(),
                    })
                    .unwrap_or_default();

                VectorSearchResult {
                    id,
                    score: point.score,
                    text,
                    metadata,
                }
            })
            .collect();

        Ok(search_results)
    }

    /// Delete passages by ID.
    pub async fn delete(&self, ids: &[String]) -> Result<(), RagError> {
        let points: Vec<PointId> = ids.iter().map(|id| PointId::from(id.clone())).collect();

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.config.collection)
                    .points(PointsIdsList { ids: points }),
            )
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        Ok(())
    }

    /// Number of stored points.
    pub async fn count(&self) -> Result<u64, RagError> {
        let info = self
            .client
            .collection_info(&self.config.collection)
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        Ok(info
            .result
            .map(|r| r.points_count.unwrap_or(0))
            .unwrap_or(0))
    }
}
