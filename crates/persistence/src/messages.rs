//! Message transcript persistence using ScyllaDB

use crate::{PersistenceError, ScyllaClient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sales_agent_core::records::{MessageRecord, MessageRole};
use uuid::Uuid;

/// Message store trait
///
/// Messages are append-only; the transcript for a session is returned in
/// creation order.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create_message(&self, record: &MessageRecord) -> Result<(), PersistenceError>;
    async fn messages_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<MessageRecord>, PersistenceError>;
    async fn latest_message(
        &self,
        session_id: &str,
    ) -> Result<Option<MessageRecord>, PersistenceError>;
}

/// ScyllaDB implementation of the message store
#[derive(Clone)]
pub struct ScyllaMessageStore {
    client: ScyllaClient,
}

impl ScyllaMessageStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    fn row_to_message(
        &self,
        row: scylla::frame::response::result::Row,
    ) -> Result<MessageRecord, PersistenceError> {
        let (session_id, created_at, _message_id, text, role, metadata_json): (
            String,
            i64,
            Uuid,
            String,
            String,
            Option<String>,
        ) = row
            .into_typed()
            .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

        let metadata = match metadata_json {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        };

        Ok(MessageRecord {
            session_id,
            text,
            role: MessageRole::from_str(&role),
            metadata,
            created_at: DateTime::from_timestamp_millis(created_at).unwrap_or_else(Utc::now),
        })
    }
}

#[async_trait]
impl MessageStore for ScyllaMessageStore {
    async fn create_message(&self, record: &MessageRecord) -> Result<(), PersistenceError> {
        let query = format!(
            "INSERT INTO {}.messages (session_id, created_at, message_id, text, role, metadata_json)
             VALUES (?, ?, ?, ?, ?, ?)",
            self.client.keyspace()
        );

        let metadata_json = record
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.client
            .session()
            .query_unpaged(
                query,
                (
                    &record.session_id,
                    record.created_at.timestamp_millis(),
                    Uuid::new_v4(),
                    &record.text,
                    record.role.as_str(),
                    metadata_json,
                ),
            )
            .await?;

        tracing::debug!(
            session_id = %record.session_id,
            role = %record.role.as_str(),
            "Message persisted"
        );

        Ok(())
    }

    async fn messages_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<MessageRecord>, PersistenceError> {
        let query = format!(
            "SELECT session_id, created_at, message_id, text, role, metadata_json
             FROM {}.messages WHERE session_id = ?",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (session_id,))
            .await?;

        let mut messages = Vec::new();
        if let Some(rows) = result.rows {
            for row in rows {
                messages.push(self.row_to_message(row)?);
            }
        }

        Ok(messages)
    }

    async fn latest_message(
        &self,
        session_id: &str,
    ) -> Result<Option<MessageRecord>, PersistenceError> {
        let query = format!(
            "SELECT session_id, created_at, message_id, text, role, metadata_json
             FROM {}.messages WHERE session_id = ? ORDER BY created_at DESC LIMIT 1",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (session_id,))
            .await?;

        if let Some(rows) = result.rows {
            if let Some(row) = rows.into_iter().next() {
                return Ok(Some(self.row_to_message(row)?));
            }
        }

        Ok(None)
    }
}
