//! In-Memory Session Store Adapter
//!
//! Keeps session records in a process-local map. Every mutation runs to
//! completion under the write lock, so concurrent patches on the same
//! session are serialized and never lose an update. Not shared across
//! processes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::foundation::{SessionId, Timestamp};
use crate::domain::session::{SessionPatch, SessionState};
use crate::ports::{SessionStore, SessionStoreError};

/// In-memory storage for session state
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, SessionState>>>,
}

impl InMemorySessionStore {
    /// Create a new, empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of stored sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &SessionId) -> Result<Option<SessionState>, SessionStoreError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn set(&self, session_id: &SessionId, state: SessionState) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        let committed = state.committed_over(sessions.get(session_id), Timestamp::now());
        debug!(session_id = %session_id, history = committed.history.len(), "Session set");
        sessions.insert(session_id.clone(), committed);
        Ok(())
    }

    async fn patch(
        &self,
        session_id: &SessionId,
        patch: SessionPatch,
    ) -> Result<SessionState, SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        let current = sessions
            .get(session_id)
            .ok_or_else(|| SessionStoreError::NotFound(session_id.clone()))?;
        let committed = patch
            .apply_to(current)
            .committed_over(Some(current), Timestamp::now());
        sessions.insert(session_id.clone(), committed.clone());
        Ok(committed)
    }

    async fn update(
        &self,
        session_id: &SessionId,
        update: &mut (dyn for<'s> FnMut(&'s SessionState) -> Option<SessionPatch> + Send),
    ) -> Result<SessionState, SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        let current = sessions
            .get(session_id)
            .ok_or_else(|| SessionStoreError::NotFound(session_id.clone()))?;
        let Some(patch) = update(current) else {
            return Ok(current.clone());
        };
        let committed = patch
            .apply_to(current)
            .committed_over(Some(current), Timestamp::now());
        sessions.insert(session_id.clone(), committed.clone());
        Ok(committed)
    }

    async fn rollback(
        &self,
        session_id: &SessionId,
        steps: usize,
    ) -> Result<SessionState, SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        let current = sessions
            .get(session_id)
            .ok_or_else(|| SessionStoreError::NotFound(session_id.clone()))?;
        match current.rolled_back(steps, Timestamp::now()) {
            Some(restored) => {
                debug!(session_id = %session_id, steps, "Session rolled back");
                sessions.insert(session_id.clone(), restored.clone());
                Ok(restored)
            }
            None => Ok(current.clone()),
        }
    }

    async fn rollback_if_current(
        &self,
        session_id: &SessionId,
        revision: u64,
    ) -> Result<Option<SessionState>, SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        let current = sessions
            .get(session_id)
            .ok_or_else(|| SessionStoreError::NotFound(session_id.clone()))?;
        if current.revision != revision {
            debug!(session_id = %session_id, expected = revision, live = current.revision, "Skipping stale rollback");
            return Ok(None);
        }
        let restored = current
            .rolled_back(1, Timestamp::now())
            .unwrap_or_else(|| current.clone());
        sessions.insert(session_id.clone(), restored.clone());
        Ok(Some(restored))
    }

    async fn delete(&self, session_id: &SessionId) -> Result<(), SessionStoreError> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }
}
