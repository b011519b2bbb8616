//! Persistence error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<scylla::transport::errors::NewSessionError> for PersistenceError {
    fn from(e: scylla::transport::errors::NewSessionError) -> Self {
        PersistenceError::ConnectionError(e.to_string())
    }
}

impl From<scylla::transport::errors::QueryError> for PersistenceError {
    fn from(e: scylla::transport::errors::QueryError) -> Self {
        PersistenceError::QueryError(e.to_string())
    }
}

impl From<PersistenceError> for sales_agent_core::Error {
    fn from(e: PersistenceError) -> Self {
        sales_agent_core::Error::Persistence(e.to_string())
    }
}
