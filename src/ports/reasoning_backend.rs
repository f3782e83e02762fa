//! Reasoning Backend Port - the opaque, nondeterministic decision source.
//!
//! Backends are slow and unreliable. Failures carry free-form text that the
//! recovery engine classifies; adapters that know the cause (an HTTP 429,
//! a parse failure) attach a hint so classification does not depend on
//! wording.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::agent::{Decision, FailureType, PhaseSignal, SessionPhase};
use crate::domain::session::Goal;

/// Error returned by a reasoning backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ReasoningError {
    pub message: String,
    pub hint: Option<FailureType>,
}

impl ReasoningError {
    /// An error whose cause is only known from its text.
    pub fn opaque(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            hint: None,
        }
    }

    /// An error whose cause the adapter already knows.
    pub fn classified(failure_type: FailureType, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            hint: Some(failure_type),
        }
    }

    /// The hinted type, or `Unknown` to let the recovery engine classify.
    pub fn failure_type(&self) -> FailureType {
        self.hint.unwrap_or(FailureType::Unknown)
    }
}

/// Everything the backend is told about the current turn.
///
/// Memory and environment values are passed through uninterpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<PhaseSignal>,
    pub phase: SessionPhase,
    pub phase_directive: String,
    pub reachable_phases: Vec<SessionPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_goal: Option<Goal>,
    pub turn_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes_elapsed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_suggested_theme: Option<String>,
    pub memory_summary: String,
    #[serde(default)]
    pub environment: Map<String, Value>,
}

impl Observation {
    /// Renders the observation as the user-turn payload.
    pub fn to_prompt(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// Port for the reasoning call.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// Proposes a decision for the observed turn.
    async fn think(
        &self,
        system_prompt: &str,
        observation: &Observation,
    ) -> Result<Decision, ReasoningError>;
}
