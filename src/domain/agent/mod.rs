//! Agent Domain Module
//!
//! Pure, stateless rules of the bedtime agent: the phase machine, decision
//! model, arbitration policy, failure recovery planning and feedback
//! detection. Nothing here performs I/O.

mod arbitration;
mod decision;
mod feedback;
mod phase;
mod recovery;
mod trace;

pub use arbitration::{ArbitrationContext, ArbitrationEngine, TimeOfDay};
pub use decision::{AgentAction, Decision, DecisionParameters, EnergyLevel, Pacing};
pub use feedback::{
    FeedbackPolicy, FeedbackSignal, DEFAULT_ACCEPTANCE_PATTERNS, DEFAULT_REJECTION_PATTERNS,
};
pub use phase::{PhaseMachine, PhaseSignal, SessionPhase};
pub use recovery::{
    BackoffBounds, CorrectionAction, CorrectionParameters, CorrectionPlan, FailureEvent,
    FailureType, RecoveryEngine, RETRY_COST_USD, SELF_CORRECT_COST_USD,
};
pub use trace::{ReasoningTrace, ResilienceMeta};
