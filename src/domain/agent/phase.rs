//! Conversation phases of the bedtime ritual and the machine that drives them.
//!
//! The machine is a pure total function: every `(phase, signal)` pair maps to
//! a phase, and signals a phase does not react to leave it unchanged. There
//! is no error state, so the turn loop never fails because of a transition.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StateMachine;

/// The current phase of the bedtime conversation.
///
/// Flow: `Idle` → `Onboarding` → `Storytelling` → `Reflection` → `WindDown`
/// → `Asleep` → (`WakeUp`) → `Idle`. Sleep can be detected from
/// storytelling onwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    /// No ritual in progress.
    #[default]
    Idle,

    /// Greeting the child and agreeing on tonight's story.
    Onboarding,

    /// A story is being told beat by beat.
    Storytelling,

    /// Short look back at the story. Always transient.
    Reflection,

    /// Calm, low-energy talk leading to sleep.
    WindDown,

    /// Sleep detected; the agent stays quiet.
    Asleep,
}

impl SessionPhase {
    /// Every phase, in ritual order.
    pub const ALL: [SessionPhase; 6] = [
        SessionPhase::Idle,
        SessionPhase::Onboarding,
        SessionPhase::Storytelling,
        SessionPhase::Reflection,
        SessionPhase::WindDown,
        SessionPhase::Asleep,
    ];

    /// Returns the agent's primary directive in this phase.
    pub fn directive(&self) -> &'static str {
        match self {
            Self::Idle => "Wait for the bedtime ritual to begin.",
            Self::Onboarding => "Greet the child warmly and agree on a story theme.",
            Self::Storytelling => "Tell the story calmly, one beat at a time.",
            Self::Reflection => "Briefly reflect on the story with the child.",
            Self::WindDown => "Keep energy low. Soothe, slow down, and invite rest.",
            Self::Asleep => "Stay silent unless the child wakes up.",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "IDLE",
            Self::Onboarding => "ONBOARDING",
            Self::Storytelling => "STORYTELLING",
            Self::Reflection => "REFLECTION",
            Self::WindDown => "WIND_DOWN",
            Self::Asleep => "ASLEEP",
        };
        write!(f, "{}", s)
    }
}

/// Inputs that may move the conversation to another phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseSignal {
    Start,
    StoryStart,
    StoryEnd,
    SleepDetected,
    WakeUp,
    /// Emitted after every committed turn.
    TurnCompleted,
}

impl PhaseSignal {
    /// Every signal.
    pub const ALL: [PhaseSignal; 6] = [
        PhaseSignal::Start,
        PhaseSignal::StoryStart,
        PhaseSignal::StoryEnd,
        PhaseSignal::SleepDetected,
        PhaseSignal::WakeUp,
        PhaseSignal::TurnCompleted,
    ];
}

/// Deterministic phase transition function.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseMachine;

impl PhaseMachine {
    /// Returns the phase reached from `current` on `signal`.
    ///
    /// Total: unhandled signals keep the current phase.
    pub fn next(current: SessionPhase, signal: PhaseSignal) -> SessionPhase {
        use PhaseSignal as S;
        use SessionPhase as P;

        match (current, signal) {
            (P::Idle, S::Start) => P::Onboarding,
            (P::Onboarding, S::StoryStart) => P::Storytelling,
            (P::Storytelling, S::StoryEnd) => P::Reflection,
            (P::Storytelling, S::SleepDetected) => P::Asleep,
            (P::Reflection, S::SleepDetected) => P::Asleep,
            (P::Reflection, _) => P::WindDown,
            (P::WindDown, S::SleepDetected) => P::Asleep,
            (P::Asleep, S::WakeUp) => P::Idle,
            (phase, _) => phase,
        }
    }
}

impl StateMachine for SessionPhase {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        let mut targets = Vec::new();
        for signal in PhaseSignal::ALL {
            let next = PhaseMachine::next(*self, signal);
            if next != *self && !targets.contains(&next) {
                targets.push(next);
            }
        }
        targets
    }
}
