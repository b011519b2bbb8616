//! Shared application state

use std::sync::Arc;

use sales_agent_agent::Orchestrator;
use sales_agent_config::Settings;
use sales_agent_persistence::PersistenceLayer;

use crate::session::SessionRegistry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub sessions: Arc<SessionRegistry>,
    pub orchestrator: Arc<Orchestrator>,
    pub persistence: PersistenceLayer,
}

impl AppState {
    pub fn new(
        config: Arc<Settings>,
        sessions: Arc<SessionRegistry>,
        orchestrator: Arc<Orchestrator>,
        persistence: PersistenceLayer,
    ) -> Self {
        Self {
            config,
            sessions,
            orchestrator,
            persistence,
        }
    }
}
