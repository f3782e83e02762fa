//! Tagged results of a turn.

use serde::Serialize;

use crate::domain::agent::{Decision, ReasoningTrace};

/// How a failed turn was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureMode {
    /// Default calming response after reasoning gave up.
    Fallback,
    /// Budget or policy stop; the turn's staging write was rolled back.
    Abort,
    /// Pre-approved response with reasoning bypassed.
    SafeMode,
}

/// Result of one turn. Every variant carries the decision to act on and the
/// trace explaining it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnOutcome {
    /// First reasoning attempt succeeded.
    Decided {
        decision: Decision,
        trace: ReasoningTrace,
    },
    /// Reasoning succeeded after one or more recoveries.
    Recovered {
        decision: Decision,
        trace: ReasoningTrace,
    },
    Failed {
        mode: FailureMode,
        decision: Decision,
        trace: ReasoningTrace,
    },
}

impl TurnOutcome {
    pub fn decision(&self) -> &Decision {
        match self {
            Self::Decided { decision, .. }
            | Self::Recovered { decision, .. }
            | Self::Failed { decision, .. } => decision,
        }
    }

    pub fn trace(&self) -> &ReasoningTrace {
        match self {
            Self::Decided { trace, .. }
            | Self::Recovered { trace, .. }
            | Self::Failed { trace, .. } => trace,
        }
    }

    pub fn failure_mode(&self) -> Option<FailureMode> {
        match self {
            Self::Failed { mode, .. } => Some(*mode),
            _ => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
