//! Session registry
//!
//! Tracks live conversations, enforces the session cap and evicts idle
//! sessions in a background task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use sales_agent_core::SessionState;
use tokio::sync::watch;

use crate::ServerError;

/// A live conversation.
///
/// `state` is behind an async mutex so at most one turn per session is in
/// flight; the registry bookkeeping stays lock-free for readers.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub state: tokio::sync::Mutex<SessionState>,
    created_at: Instant,
    last_activity: RwLock<Instant>,
    active: RwLock<bool>,
}

impl Session {
    pub fn new(state: SessionState) -> Self {
        Self {
            id: state.session_id.clone(),
            state: tokio::sync::Mutex::new(state),
            created_at: Instant::now(),
            last_activity: RwLock::new(Instant::now()),
            active: RwLock::new(true),
        }
    }

    /// Mark activity on this session
    pub fn touch(&self) {
        *self.last_activity.write() = Instant::now();
    }

    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.last_activity.read().elapsed() > timeout
    }

    pub fn close(&self) {
        *self.active.write() = false;
    }

    pub fn is_active(&self) -> bool {
        *self.active.read()
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// Registry of live sessions with idle eviction.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    max_sessions: usize,
    session_timeout: Duration,
    cleanup_interval: Duration,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize, session_timeout: Duration, cleanup_interval: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
            session_timeout,
            cleanup_interval,
        }
    }

    /// Register a new session, evicting expired ones first when at capacity.
    pub fn insert(&self, state: SessionState) -> Result<Arc<Session>, ServerError> {
        {
            let sessions = self.sessions.read();
            if sessions.len() >= self.max_sessions {
                drop(sessions);
                let removed = self.cleanup_expired();
                tracing::info!(removed, "Session capacity reached, evicted expired sessions");

                if self.sessions.read().len() >= self.max_sessions {
                    return Err(ServerError::Session("Max sessions reached".to_string()));
                }
            }
        }

        let session = Arc::new(Session::new(state));
        self.sessions
            .write()
            .insert(session.id.clone(), session.clone());

        tracing::info!(session_id = %session.id, count = self.count(), "Session registered");
        Ok(session)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        let removed = self.sessions.write().remove(id);
        if let Some(session) = &removed {
            session.close();
            tracing::info!(session_id = %id, "Session removed");
        }
        removed
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn list(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }

    /// Evict sessions idle past the timeout or explicitly closed.
    pub fn cleanup_expired(&self) -> usize {
        let expired: Vec<String> = {
            let sessions = self.sessions.read();
            sessions
                .iter()
                .filter(|(_, s)| s.is_expired(self.session_timeout) || !s.is_active())
                .map(|(id, _)| id.clone())
                .collect()
        };

        let mut sessions = self.sessions.write();
        for id in &expired {
            sessions.remove(id);
            tracing::debug!(session_id = %id, "Expired session evicted");
        }
        expired.len()
    }

    /// Spawn the periodic cleanup task. Dropping the returned sender (or
    /// sending `true`) stops the task.
    pub fn start_cleanup_task(self: &Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let registry = Arc::clone(self);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(registry.cleanup_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let removed = registry.cleanup_expired();
                        if removed > 0 {
                            tracing::info!(removed, remaining = registry.count(), "Session cleanup pass");
                        }
                    }
                    result = shutdown_rx.changed() => {
                        if result.is_err() || *shutdown_rx.borrow() {
                            tracing::info!("Session cleanup task shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(max: usize) -> SessionRegistry {
        SessionRegistry::new(max, Duration::from_secs(60), Duration::from_secs(60))
    }

    fn state(id: &str) -> SessionState {
        SessionState::new(id, "welcome")
    }

    #[test]
    fn insert_and_get() {
        let registry = registry(10);
        registry.insert(state("s1")).unwrap();

        let session = registry.get("s1").unwrap();
        assert_eq!(session.id, "s1");
        assert!(session.is_active());
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn capacity_is_enforced() {
        let registry = registry(2);
        registry.insert(state("s1")).unwrap();
        registry.insert(state("s2")).unwrap();

        let err = registry.insert(state("s3")).unwrap_err();
        assert!(matches!(err, ServerError::Session(_)));
    }

    #[test]
    fn closed_sessions_are_evicted_at_capacity() {
        let registry = registry(1);
        let first = registry.insert(state("s1")).unwrap();
        first.close();

        // The closed session makes room for the new one
        registry.insert(state("s2")).unwrap();
        assert!(registry.get("s1").is_none());
        assert!(registry.get("s2").is_some());
    }

    #[test]
    fn remove_closes_the_session() {
        let registry = registry(10);
        registry.insert(state("s1")).unwrap();

        let removed = registry.remove("s1").unwrap();
        assert!(!removed.is_active());
        assert_eq!(registry.count(), 0);
        assert!(registry.remove("s1").is_none());
    }
}
