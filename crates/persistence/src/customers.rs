//! Customer record persistence using ScyllaDB

use crate::{PersistenceError, ScyllaClient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sales_agent_core::records::CustomerRecord;

/// Customer store trait
///
/// One record per session. Upserts overwrite name, email and interests but
/// preserve the original creation timestamp.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn upsert_customer(
        &self,
        record: &CustomerRecord,
    ) -> Result<CustomerRecord, PersistenceError>;
    async fn customer_for_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CustomerRecord>, PersistenceError>;
}

/// ScyllaDB implementation of the customer store
#[derive(Clone)]
pub struct ScyllaCustomerStore {
    client: ScyllaClient,
}

impl ScyllaCustomerStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    fn row_to_customer(
        &self,
        row: scylla::frame::response::result::Row,
    ) -> Result<CustomerRecord, PersistenceError> {
        let (session_id, name, email, product_interest, created_at, updated_at): (
            String,
            String,
            String,
            Option<Vec<String>>,
            i64,
            i64,
        ) = row
            .into_typed()
            .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

        Ok(CustomerRecord {
            session_id,
            name,
            email,
            product_interest: product_interest.unwrap_or_default(),
            created_at: DateTime::from_timestamp_millis(created_at).unwrap_or_else(Utc::now),
            updated_at: DateTime::from_timestamp_millis(updated_at).unwrap_or_else(Utc::now),
        })
    }
}

#[async_trait]
impl CustomerStore for ScyllaCustomerStore {
    async fn upsert_customer(
        &self,
        record: &CustomerRecord,
    ) -> Result<CustomerRecord, PersistenceError> {
        // Keep the first-write created_at across upserts
        let existing = self.customer_for_session(&record.session_id).await?;
        let created_at = existing
            .map(|c| c.created_at)
            .unwrap_or(record.created_at);
        let updated_at = Utc::now();

        let query = format!(
            "INSERT INTO {}.customers (session_id, name, email, product_interest, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            self.client.keyspace()
        );

        self.client
            .session()
            .query_unpaged(
                query,
                (
                    &record.session_id,
                    &record.name,
                    &record.email,
                    &record.product_interest,
                    created_at.timestamp_millis(),
                    updated_at.timestamp_millis(),
                ),
            )
            .await?;

        tracing::info!(
            session_id = %record.session_id,
            name = %record.name,
            "Customer record upserted"
        );

        Ok(CustomerRecord {
            created_at,
            updated_at,
            ..record.clone()
        })
    }

    async fn customer_for_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CustomerRecord>, PersistenceError> {
        let query = format!(
            "SELECT session_id, name, email, product_interest, created_at, updated_at
             FROM {}.customers WHERE session_id = ?",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (session_id,))
            .await?;

        if let Some(rows) = result.rows {
            if let Some(row) = rows.into_iter().next() {
                return Ok(Some(self.row_to_customer(row)?));
            }
        }

        Ok(None)
    }
}
