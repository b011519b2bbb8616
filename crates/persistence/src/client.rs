//! ScyllaDB connection handling

use std::sync::Arc;
use std::time::Duration;

use scylla::{Session, SessionBuilder};

use crate::error::PersistenceError;
use crate::schema;

/// Connection parameters for the ScyllaDB cluster.
///
/// Callers assemble this from their own settings layer; environment and
/// file handling live in the config crate, not here.
#[derive(Debug, Clone)]
pub struct ScyllaConfig {
    pub hosts: Vec<String>,
    pub keyspace: String,
    pub replication_factor: u8,
    pub connect_timeout: Duration,
}

impl Default for ScyllaConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["127.0.0.1:9042".to_string()],
            keyspace: "sales_agent".to_string(),
            replication_factor: 1,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Shared session handle used by every store implementation.
#[derive(Clone)]
pub struct ScyllaClient {
    session: Arc<Session>,
    config: ScyllaConfig,
}

impl ScyllaClient {
    pub async fn connect(config: ScyllaConfig) -> Result<Self, PersistenceError> {
        tracing::info!(hosts = ?config.hosts, keyspace = %config.keyspace, "Connecting to ScyllaDB");

        let session = SessionBuilder::new()
            .known_nodes(&config.hosts)
            .connection_timeout(config.connect_timeout)
            .build()
            .await?;

        Ok(Self {
            session: Arc::new(session),
            config,
        })
    }

    /// Create the keyspace and tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), PersistenceError> {
        schema::create_keyspace(
            &self.session,
            &self.config.keyspace,
            self.config.replication_factor,
        )
        .await?;
        schema::create_tables(&self.session, &self.config.keyspace).await?;
        tracing::info!(keyspace = %self.config.keyspace, "Schema ensured");
        Ok(())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn keyspace(&self) -> &str {
        &self.config.keyspace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_local_single_node() {
        let config = ScyllaConfig::default();
        assert_eq!(config.hosts, vec!["127.0.0.1:9042".to_string()]);
        assert_eq!(config.keyspace, "sales_agent");
        assert_eq!(config.replication_factor, 1);
    }
}
