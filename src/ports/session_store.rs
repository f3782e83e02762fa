//! Session Store Port - versioned persistence of per-session state.
//!
//! Every mutation snapshots the record it replaces into the bounded
//! history, so the orchestrator can undo a turn's writes with `rollback`.
//! Implementations must make `set`, `patch`, `update` and both rollbacks
//! atomic read-modify-write units per key.

use async_trait::async_trait;

use crate::domain::foundation::SessionId;
use crate::domain::session::{SessionPatch, SessionState};

/// Errors that can occur during session store operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionStoreError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    #[error("Failed to (de)serialize session: {0}")]
    Serialization(String),

    #[error("Session backend error: {0}")]
    Backend(String),

    #[error("Concurrent modification of session {0} was not resolved")]
    Conflict(SessionId),
}

/// Port for storing and versioning session state.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the live record, or `None` if the session does not exist.
    async fn get(&self, session_id: &SessionId) -> Result<Option<SessionState>, SessionStoreError>;

    /// Replaces the live record.
    ///
    /// The previous record (if any) is snapshotted into the new record's
    /// history, capped at the history capacity. `history` and `updated_at`
    /// on `state` are ignored; the store sets both.
    async fn set(&self, session_id: &SessionId, state: SessionState) -> Result<(), SessionStoreError>;

    /// Atomically merges `patch` into the live record and returns the result.
    ///
    /// # Errors
    /// Returns `SessionStoreError::NotFound` if no record exists.
    async fn patch(
        &self,
        session_id: &SessionId,
        patch: SessionPatch,
    ) -> Result<SessionState, SessionStoreError>;

    /// Atomically derives a patch from the live record and merges it.
    ///
    /// `update` sees the current record and returns the patch to apply, or
    /// `None` to leave the record alone. Backends that retry on conflict may
    /// call it more than once, so it must only assign to what it captures.
    /// Returns the live record after the call.
    ///
    /// # Errors
    /// Returns `SessionStoreError::NotFound` if no record exists.
    async fn update(
        &self,
        session_id: &SessionId,
        update: &mut (dyn for<'s> FnMut(&'s SessionState) -> Option<SessionPatch> + Send),
    ) -> Result<SessionState, SessionStoreError>;

    /// Restores the record from up to `steps` snapshots back and returns it.
    ///
    /// A no-op (returning the live record) when `steps` is zero or the
    /// history is empty. Asking for more steps than exist restores the
    /// oldest snapshot.
    ///
    /// # Errors
    /// Returns `SessionStoreError::NotFound` if no record exists.
    async fn rollback(
        &self,
        session_id: &SessionId,
        steps: usize,
    ) -> Result<SessionState, SessionStoreError>;

    /// Rolls back one version, but only while the live record is still at
    /// `revision`.
    ///
    /// Returns `None` without writing when another write landed since.
    ///
    /// # Errors
    /// Returns `SessionStoreError::NotFound` if no record exists.
    async fn rollback_if_current(
        &self,
        session_id: &SessionId,
        revision: u64,
    ) -> Result<Option<SessionState>, SessionStoreError>;

    /// Removes the record and its history. Missing sessions are not an error.
    async fn delete(&self, session_id: &SessionId) -> Result<(), SessionStoreError>;
}
