//! Orchestrator - runs turns and applies session events.
//!
//! Owns no state of its own: the session store is the only shared mutable
//! resource, and the policy engines are pure. One orchestrator can serve any
//! number of concurrent turns.

mod error;
mod events;
mod observation;
mod outcome;
mod turn;

pub use error::OrchestratorError;
pub use events::{BeatCompletedEvent, BeatOutcome, SleepCueEvent, SleepOutcome};
pub use outcome::{FailureMode, TurnOutcome};
pub use turn::{GoalRequest, TurnCommand};

use std::sync::Arc;
use tracing::warn;

use crate::config::AgentConfig;
use crate::domain::agent::{BackoffBounds, FeedbackPolicy, ReasoningTrace, RecoveryEngine};
use crate::ports::{MemoryPort, ReasoningBackend, SessionStore, TraceSink};

/// Coordinates the session store, reasoning backend, memory and trace sink.
pub struct Orchestrator {
    sessions: Arc<dyn SessionStore>,
    reasoning: Arc<dyn ReasoningBackend>,
    memory: Arc<dyn MemoryPort>,
    traces: Arc<dyn TraceSink>,
    config: AgentConfig,
    feedback: FeedbackPolicy,
    recovery: RecoveryEngine,
    backoff: BackoffBounds,
}

impl Orchestrator {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        reasoning: Arc<dyn ReasoningBackend>,
        memory: Arc<dyn MemoryPort>,
        traces: Arc<dyn TraceSink>,
        config: AgentConfig,
    ) -> Self {
        Self {
            sessions,
            reasoning,
            memory,
            traces,
            recovery: config.recovery_engine(),
            backoff: config.backoff_bounds(),
            feedback: FeedbackPolicy::default(),
            config,
        }
    }

    /// Replaces the default rejection/acceptance wording.
    pub fn with_feedback_policy(mut self, policy: FeedbackPolicy) -> Self {
        self.feedback = policy;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Saves a trace; sink failures are logged and swallowed.
    async fn emit(&self, trace: &ReasoningTrace) {
        if let Err(err) = self.traces.save(trace).await {
            warn!(
                trace_id = %trace.trace_id,
                session_id = %trace.session_id,
                error = %err,
                "Trace sink rejected trace; continuing"
            );
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("recovery", &self.recovery)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}
