//! Application layer - the orchestrator that drives turns and events.
//!
//! Coordinates the domain engines with the ports; holds no policy of its own.

pub mod orchestrator;

pub use orchestrator::{
    BeatCompletedEvent, BeatOutcome, FailureMode, GoalRequest, Orchestrator, OrchestratorError,
    SleepCueEvent, SleepOutcome, TurnCommand, TurnOutcome,
};
