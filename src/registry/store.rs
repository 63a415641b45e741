//! Session registry implementation
//!
//! The only structure shared between client connections. Lookups, inserts
//! and removals go through a sharded concurrent map, so callers never hold
//! a lock across an await.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::broker::BrokerConnector;
use crate::error::{Error, Result};
use crate::server::config::SessionConfig;
use crate::session::{ClientChannel, SessionPhase, StreamingSession};
use crate::upstream::CredentialProvider;

/// Live sessions keyed by session ID
pub struct SessionRegistry {
    sessions: DashMap<u64, Arc<StreamingSession>>,
    next_session_id: AtomicU64,
    provider: Arc<dyn CredentialProvider>,
    connector: Arc<dyn BrokerConnector>,
    config: SessionConfig,
}

impl SessionRegistry {
    pub fn new(
        provider: Arc<dyn CredentialProvider>,
        connector: Arc<dyn BrokerConnector>,
        config: SessionConfig,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            next_session_id: AtomicU64::new(1),
            provider,
            connector,
            config,
        }
    }

    /// Session configuration applied to new sessions
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Create and register an idle session bound to `channel`
    pub fn open(&self, channel: ClientChannel) -> Arc<StreamingSession> {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let session = Arc::new(StreamingSession::new(
            id,
            channel,
            Arc::clone(&self.provider),
            Arc::clone(&self.connector),
            self.config.clone(),
        ));
        self.sessions.insert(id, Arc::clone(&session));

        tracing::debug!(session_id = id, sessions = self.sessions.len(), "Session registered");
        session
    }

    /// Connect a registered session
    ///
    /// A session that fails to connect is closed and removed.
    pub async fn connect(&self, session_id: u64, serial: &str) -> Result<()> {
        let session = self.get(session_id).ok_or(Error::InvalidState {
            expected: SessionPhase::Idle,
            actual: SessionPhase::Closed,
        })?;

        let result = session.connect(serial).await;
        if result.is_err() {
            self.sessions.remove(&session_id);
            tracing::debug!(session_id = session_id, "Session removed after failed connect");
        }
        result
    }

    /// Remove a session and tear it down
    ///
    /// Unknown IDs are ignored, so repeated calls are harmless.
    pub async fn disconnect(&self, session_id: u64) -> Result<()> {
        let removed = self.sessions.remove(&session_id);
        match removed {
            Some((_, session)) => session.disconnect().await,
            None => Ok(()),
        }
    }

    pub fn get(&self, session_id: u64) -> Option<Arc<StreamingSession>> {
        self.sessions
            .get(&session_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, session_id: u64) -> bool {
        self.sessions.contains_key(&session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// IDs of all registered sessions, ascending
    pub fn session_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.sessions.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Drop entries whose session already reached `Closed`
    pub fn prune_closed(&self) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.phase() != SessionPhase::Closed);
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            tracing::info!(removed = removed, "Closed sessions removed by cleanup");
        }
        removed
    }

    /// Spawn background cleanup task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_cleanup_task(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.prune_closed();
            }
        })
    }

    /// Disconnect and remove every session
    pub async fn shutdown(&self) {
        let sessions: Vec<Arc<StreamingSession>> = self
            .session_ids()
            .into_iter()
            .filter_map(|id| self.sessions.remove(&id).map(|(_, session)| session))
            .collect();

        tracing::info!(sessions = sessions.len(), "Shutting down sessions");
        futures::future::join_all(sessions.iter().map(|session| session.disconnect())).await;
    }
}
