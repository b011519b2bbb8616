//! In-memory store implementations
//!
//! Used when persistence is disabled or ScyllaDB is unreachable at startup,
//! and by tests. Same trait surface, same ordering guarantees, no durability.

use crate::{CustomerStore, EventStore, MessageStore, PersistenceError};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use sales_agent_core::records::{CustomerRecord, EventRecord, MessageRecord};
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory message store
#[derive(Default, Clone)]
pub struct InMemoryMessageStore {
    messages: Arc<RwLock<HashMap<String, Vec<MessageRecord>>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn create_message(&self, record: &MessageRecord) -> Result<(), PersistenceError> {
        self.messages
            .write()
            .entry(record.session_id.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn messages_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<MessageRecord>, PersistenceError> {
        Ok(self
            .messages
            .read()
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn latest_message(
        &self,
        session_id: &str,
    ) -> Result<Option<MessageRecord>, PersistenceError> {
        Ok(self
            .messages
            .read()
            .get(session_id)
            .and_then(|msgs| msgs.last().cloned()))
    }
}

/// In-memory customer store
#[derive(Default, Clone)]
pub struct InMemoryCustomerStore {
    customers: Arc<RwLock<HashMap<String, CustomerRecord>>>,
}

impl InMemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomerStore for InMemoryCustomerStore {
    async fn upsert_customer(
        &self,
        record: &CustomerRecord,
    ) -> Result<CustomerRecord, PersistenceError> {
        let mut customers = self.customers.write();
        let created_at = customers
            .get(&record.session_id)
            .map(|c| c.created_at)
            .unwrap_or(record.created_at);

        let stored = CustomerRecord {
            created_at,
            updated_at: Utc::now(),
            ..record.clone()
        };
        customers.insert(record.session_id.clone(), stored.clone());
        Ok(stored)
    }

    async fn customer_for_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CustomerRecord>, PersistenceError> {
        Ok(self.customers.read().get(session_id).cloned())
    }
}

/// In-memory event store
#[derive(Default, Clone)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<HashMap<String, Vec<EventRecord>>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn create_event(&self, record: &EventRecord) -> Result<(), PersistenceError> {
        self.events
            .write()
            .entry(record.session_id.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn events_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<EventRecord>, PersistenceError> {
        // Newest first, matching the ScyllaDB clustering order
        let mut events = self
            .events
            .read()
            .get(session_id)
            .cloned()
            .unwrap_or_default();
        events.reverse();
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

#[cfg(test)]
mod tests {
    use super::*;
    use sales_agent_core::records::MessageRole;

    #[tokio::test]
    async fn messages_keep_insertion_order() {
        let store = InMemoryMessageStore::new();
        store
            .create_message(&MessageRecord::new("s1", "hello", MessageRole::User))
            .await
            .unwrap();
        store
            .create_message(&MessageRecord::new("s1", "hi there", MessageRole::Ai))
            .await
            .unwrap();

        let messages = store.messages_for_session("s1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].role, MessageRole::Ai);

        let latest = store.latest_message("s1").await.unwrap().unwrap();
        assert_eq!(latest.text, "hi there");
    }

    #[tokio::test]
    async fn customer_upsert_preserves_created_at() {
        let store = InMemoryCustomerStore::new();
        let first = store
            .upsert_customer(&CustomerRecord::new("s1", "Priya", "priya@example.com", vec![]))
            .await
            .unwrap();

        let second = store
            .upsert_customer(&CustomerRecord::new(
                "s1",
                "Priya Sharma",
                "priya@example.com",
                vec!["crm".to_string()],
            ))
            .await
            .unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.name, "Priya Sharma");
        assert_eq!(second.product_interest, vec!["crm".to_string()]);
    }

    #[tokio::test]
    async fn events_filter_by_name_newest_first() {
        let store = InMemoryEventStore::new();
        store
            .create_event(&EventRecord::new(
                "s1",
                "demo_scheduled",
                serde_json::json!({"date": "2026-09-01"}),
            ))
            .await
            .unwrap();
        store
            .create_event(&EventRecord::new(
                "s1",
                "demo_scheduled",
                serde_json::json!({"date": "2026-09-02"}),
            ))
            .await
            .unwrap();
        store
            .create_event(&EventRecord::new("s1", "other", serde_json::json!({})))
            .await
            .unwrap();

        let events = store.events_by_name("s1", "demo_scheduled").await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data["date"], "2026-09-02");
    }

    #[tokio::test]
    async fn unknown_session_reads_are_empty() {
        let store = InMemoryMessageStore::new();
        assert!(store.messages_for_session("nope").await.unwrap().is_empty());
        assert!(store.latest_message("nope").await.unwrap().is_none());
    }
}
