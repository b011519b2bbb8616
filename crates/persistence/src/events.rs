//! Business event persistence using ScyllaDB

use crate::{PersistenceError, ScyllaClient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sales_agent_core::records::EventRecord;
use uuid::Uuid;

/// Event store trait
///
/// Events are append-only. Reads return newest first.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn create_event(&self, record: &EventRecord) -> Result<(), PersistenceError>;
    async fn events_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<EventRecord>, PersistenceError>;
    async fn events_by_name(
        &self,
        session_id: &str,
        name: &str,
    ) -> Result<Vec<EventRecord>, PersistenceError>;
}

/// ScyllaDB implementation of the event store
#[derive(Clone)]
pub struct ScyllaEventStore {
    client: ScyllaClient,
}

impl ScyllaEventStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    fn row_to_event(
        &self,
        row: scylla::frame::response::result::Row,
    ) -> Result<EventRecord, PersistenceError> {
        let (session_id, created_at, _event_id, name, data_json, metadata_json): (
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

        Ok(EventRecord {
            session_id,
            name,
            data: serde_json::from_str(&data_json)?,
            metadata,
            created_at: DateTime::from_timestamp_millis(created_at).unwrap_or_else(Utc::now),
        })
    }
}

#[async_trait]
impl EventStore for ScyllaEventStore {
    async fn create_event(&self, record: &EventRecord) -> Result<(), PersistenceError> {
        let query = format!(
            "INSERT INTO {}.events (session_id, created_at, event_id, name, data_json, metadata_json)
             VALUES (?, ?, ?, ?, ?, ?)",
            self.client.keyspace()
        );

        let data_json = serde_json::to_string(&record.data)?;
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
                    &record.name,
                    data_json,
                    metadata_json,
                ),
            )
            .await?;

        tracing::info!(
            session_id = %record.session_id,
            event = %record.name,
            "Event persisted"
        );

        Ok(())
    }

    async fn events_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<EventRecord>, PersistenceError> {
        let query = format!(
            "SELECT session_id, created_at, event_id, name, data_json, metadata_json
             FROM {}.events WHERE session_id = ?",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (session_id,))
            .await?;

        let mut events = Vec::new();
        if let Some(rows) = result.rows {
            for row in rows {
                events.push(self.row_to_event(row)?);
            }
        }

        Ok(events)
    }

    async fn events_by_name(
        &self,
        session_id: &str,
        name: &str,
    ) -> Result<Vec<EventRecord>, PersistenceError> {
        let mut events = self.events_for_session(session_id).await?;
        events.retain(|e| e.name == name);
        Ok(events)
    }
}
