//! Trace Sink Port - best-effort destination for reasoning traces.

use async_trait::async_trait;

use crate::domain::agent::ReasoningTrace;

/// Errors from a trace sink. Never propagated out of a turn.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TraceSinkError {
    #[error("Trace sink I/O error: {0}")]
    Io(String),

    #[error("Failed to serialize trace: {0}")]
    Serialization(String),

    #[error("Trace sink unavailable: {0}")]
    Unavailable(String),
}

/// Port for emitting reasoning traces.
#[async_trait]
pub trait TraceSink: Send + Sync {
    async fn save(&self, trace: &ReasoningTrace) -> Result<(), TraceSinkError>;
}
