//! ScyllaDB persistence layer for sales-agent
//!
//! Provides persistent storage for:
//! - Messages (full conversation transcript, append-only)
//! - Customer records (name/email captured during the conversation)
//! - Business events (demo scheduling and similar outcomes)
//!
//! Every store is a trait with a ScyllaDB implementation and an in-memory
//! implementation; the server falls back to in-memory when persistence is
//! disabled or the cluster is unreachable at startup.

pub mod client;
pub mod customers;
pub mod error;
pub mod events;
pub mod memory;
pub mod messages;
pub mod schema;

pub use client::{ScyllaClient, ScyllaConfig};
pub use customers::{CustomerStore, ScyllaCustomerStore};
pub use error::PersistenceError;
pub use events::{EventStore, ScyllaEventStore};
pub use memory::{InMemoryCustomerStore, InMemoryEventStore, InMemoryMessageStore};
pub use messages::{MessageStore, ScyllaMessageStore};

use std::sync::Arc;

/// Combined persistence layer with all stores
#[derive(Clone)]
pub struct PersistenceLayer {
    pub messages: Arc<dyn MessageStore>,
    pub customers: Arc<dyn CustomerStore>,
    pub events: Arc<dyn EventStore>,
}

impl PersistenceLayer {
    /// Build the layer over an in-memory backend
    pub fn in_memory() -> Self {
        Self {
            messages: Arc::new(InMemoryMessageStore::new()),
            customers: Arc::new(InMemoryCustomerStore::new()),
            events: Arc::new(InMemoryEventStore::new()),
        }
    }
}

/// Initialize the persistence layer backed by ScyllaDB
pub async fn init(config: ScyllaConfig) -> Result<PersistenceLayer, PersistenceError> {
    let client = ScyllaClient::connect(config).await?;
    client.ensure_schema().await?;

    Ok(PersistenceLayer {
        messages: Arc::new(ScyllaMessageStore::new(client.clone())),
        customers: Arc::new(ScyllaCustomerStore::new(client.clone())),
        events: Arc::new(ScyllaEventStore::new(client)),
    })
}
