//! ScyllaDB schema creation

use crate::error::PersistenceError;
use scylla::Session;

/// Create the keyspace if it doesn't exist
pub async fn create_keyspace(
    session: &Session,
    keyspace: &str,
    replication_factor: u8,
) -> Result<(), PersistenceError> {
    let query = format!(
        "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
        keyspace, replication_factor
    );

    session
        .query_unpaged(query, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("Failed to create keyspace: {}", e)))?;

    Ok(())
}

/// Create all required tables
pub async fn create_tables(session: &Session, keyspace: &str) -> Result<(), PersistenceError> {
    // Messages: full transcript per session, clustered in creation order
    let messages_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.messages (
            session_id TEXT,
            created_at TIMESTAMP,
            message_id UUID,
            text TEXT,
            role TEXT,
            metadata_json TEXT,
            PRIMARY KEY ((session_id), created_at, message_id)
        ) WITH CLUSTERING ORDER BY (created_at ASC, message_id ASC)
    "#,
        keyspace
    );

    session
        .query_unpaged(messages_table, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("Failed to create messages table: {}", e)))?;

    // Customers: one row per session, upserted as fields become known
    let customers_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.customers (
            session_id TEXT,
            name TEXT,
            email TEXT,
            product_interest LIST<TEXT>,
            created_at TIMESTAMP,
            updated_at TIMESTAMP,
            PRIMARY KEY (session_id)
        )
    "#,
        keyspace
    );

    session
        .query_unpaged(customers_table, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("Failed to create customers table: {}", e)))?;

    // Events: append-only business events, newest first
    let events_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.events (
            session_id TEXT,
            created_at TIMESTAMP,
            event_id UUID,
            name TEXT,
            data_json TEXT,
            metadata_json TEXT,
            PRIMARY KEY ((session_id), created_at, event_id)
        ) WITH CLUSTERING ORDER BY (created_at DESC, event_id DESC)
    "#,
        keyspace
    );

    session
        .query_unpaged(events_table, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("Failed to create events table: {}", e)))?;

    tracing::info!("All tables created successfully");
    Ok(())
}
