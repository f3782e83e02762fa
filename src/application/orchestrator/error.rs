//! Errors raised inside the orchestrator.
//!
//! Turn errors never reach the caller of `conduct_turn`; they are turned
//! into a safe-mode outcome. Event handlers return them directly.

use thiserror::Error;

use crate::domain::foundation::{SessionId, ValidationError};
use crate::ports::SessionStoreError;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Session store error: {0}")]
    Store(SessionStoreError),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl OrchestratorError {
    pub fn invalid_event(reason: impl Into<String>) -> Self {
        Self::InvalidEvent(reason.into())
    }
}

impl From<SessionStoreError> for OrchestratorError {
    fn from(err: SessionStoreError) -> Self {
        match err {
            SessionStoreError::NotFound(session_id) => Self::SessionNotFound(session_id),
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_session_not_found() {
        let sid = SessionId::new("s-1").unwrap();
        let err: OrchestratorError = SessionStoreError::NotFound(sid.clone()).into();
        assert!(matches!(err, OrchestratorError::SessionNotFound(id) if id == sid));
    }

    #[test]
    fn other_store_errors_are_wrapped() {
        let err: OrchestratorError = SessionStoreError::Backend("down".to_string()).into();
        assert!(matches!(err, OrchestratorError::Store(_)));
        assert!(err.to_string().contains("down"));
    }
}
