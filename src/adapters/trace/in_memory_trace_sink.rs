//! In-Memory Trace Sink Adapter
//!
//! Records traces in memory for inspection. Can be switched into a failing
//! mode to check that turns survive an unavailable sink.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::agent::{AgentAction, ReasoningTrace};
use crate::domain::foundation::SessionId;
use crate::ports::{TraceSink, TraceSinkError};

/// In-memory trace recorder
#[derive(Debug, Clone, Default)]
pub struct InMemoryTraceSink {
    traces: Arc<RwLock<Vec<ReasoningTrace>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `save` fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All recorded traces, oldest first
    pub async fn traces(&self) -> Vec<ReasoningTrace> {
        self.traces.read().await.clone()
    }

    /// Traces recorded for one session
    pub async fn traces_for(&self, session_id: &SessionId) -> Vec<ReasoningTrace> {
        self.traces
            .read()
            .await
            .iter()
            .filter(|t| &t.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Traces whose decision took `action`
    pub async fn traces_with_action(&self, action: &AgentAction) -> Vec<ReasoningTrace> {
        self.traces
            .read()
            .await
            .iter()
            .filter(|t| &t.decision.action == action)
            .cloned()
            .collect()
    }

    pub async fn trace_count(&self) -> usize {
        self.traces.read().await.len()
    }
}

#[async_trait]
impl TraceSink for InMemoryTraceSink {
    async fn save(&self, trace: &ReasoningTrace) -> Result<(), TraceSinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TraceSinkError::Unavailable("sink disabled".to_string()));
        }
        self.traces.write().await.push(trace.clone());
        Ok(())
    }
}
