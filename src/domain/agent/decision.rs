//! Decisions proposed by the reasoning backend.
//!
//! A `Decision` arrives from an unreliable backend, gets validated, and is
//! then corrected by the arbitration rules before anything acts on it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::domain::foundation::{Confidence, ValidationError};
use crate::domain::session::GoalType;

use super::phase::PhaseSignal;

/// Action the agent takes this turn.
///
/// Unknown action names from the backend are preserved as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentAction {
    Greet,
    SuggestTheme,
    StartStory,
    ContinueStory,
    AdventureStory,
    EndStory,
    AskQuestion,
    Reflect,
    PlayGame,
    SoothingTalk,
    BreathingExercise,
    StaySilent,
    GoalAchieved,
    Custom(String),
}

impl AgentAction {
    /// Actions that excite rather than calm.
    pub fn is_high_energy(&self) -> bool {
        matches!(self, Self::AdventureStory | Self::PlayGame)
    }

    /// Actions that propose story content the child may accept or reject.
    pub fn is_content_suggestion(&self) -> bool {
        matches!(
            self,
            Self::SuggestTheme | Self::StartStory | Self::AdventureStory
        )
    }

    /// Phase signal implied by taking this action, if any.
    pub fn phase_signal(&self) -> Option<PhaseSignal> {
        match self {
            Self::StartStory | Self::AdventureStory => Some(PhaseSignal::StoryStart),
            Self::EndStory => Some(PhaseSignal::StoryEnd),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Greet => "GREET",
            Self::SuggestTheme => "SUGGEST_THEME",
            Self::StartStory => "START_STORY",
            Self::ContinueStory => "CONTINUE_STORY",
            Self::AdventureStory => "ADVENTURE_STORY",
            Self::EndStory => "END_STORY",
            Self::AskQuestion => "ASK_QUESTION",
            Self::Reflect => "REFLECT",
            Self::PlayGame => "PLAY_GAME",
            Self::SoothingTalk => "SOOTHING_TALK",
            Self::BreathingExercise => "BREATHING_EXERCISE",
            Self::StaySilent => "STAY_SILENT",
            Self::GoalAchieved => "GOAL_ACHIEVED",
            Self::Custom(name) => name,
        }
    }
}

impl From<String> for AgentAction {
    fn from(name: String) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "GREET" => Self::Greet,
            "SUGGEST_THEME" => Self::SuggestTheme,
            "START_STORY" => Self::StartStory,
            "CONTINUE_STORY" => Self::ContinueStory,
            "ADVENTURE_STORY" => Self::AdventureStory,
            "END_STORY" => Self::EndStory,
            "ASK_QUESTION" => Self::AskQuestion,
            "REFLECT" => Self::Reflect,
            "PLAY_GAME" => Self::PlayGame,
            "SOOTHING_TALK" => Self::SoothingTalk,
            "BREATHING_EXERCISE" => Self::BreathingExercise,
            "STAY_SILENT" => Self::StaySilent,
            "GOAL_ACHIEVED" => Self::GoalAchieved,
            _ => Self::Custom(name),
        }
    }
}

impl From<AgentAction> for String {
    fn from(action: AgentAction) -> Self {
        action.as_str().to_string()
    }
}

impl fmt::Display for AgentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How stimulating the delivery should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyLevel {
    Low,
    Medium,
    High,
}

/// Speaking tempo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pacing {
    Slow,
    Normal,
    Fast,
}

/// Known decision parameters plus an open bag for everything else.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_level: Option<EnergyLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pacing: Option<Pacing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A reasoning step: what the agent thought and what it will do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    #[serde(default)]
    pub goals_considered: Vec<GoalType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_identified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_off_made: Option<String>,
    pub thought: String,
    pub action: AgentAction,
    pub confidence: Confidence,
    #[serde(default)]
    pub parameters: DecisionParameters,
}

const FALLBACK_SCRIPT: &str =
    "Let's take a slow, deep breath together. You are safe and cozy, and it is time to rest.";

const SAFE_MODE_SCRIPT: &str =
    "It's time to get comfy. Close your eyes and listen to the quiet. Goodnight.";

impl Decision {
    /// Creates a decision with default parameters and no goals.
    pub fn new(thought: impl Into<String>, action: AgentAction, confidence: Confidence) -> Self {
        Self {
            goals_considered: Vec::new(),
            conflict_identified: None,
            trade_off_made: None,
            thought: thought.into(),
            action,
            confidence,
            parameters: DecisionParameters::default(),
        }
    }

    /// Rejects backend output that is structurally valid but unusable.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.thought.trim().is_empty() {
            return Err(ValidationError::empty_field("thought"));
        }
        if let AgentAction::Custom(name) = &self.action {
            if name.trim().is_empty() {
                return Err(ValidationError::empty_field("action"));
            }
        }
        Ok(())
    }

    /// True if the action or its requested energy is high.
    pub fn is_high_energy(&self) -> bool {
        self.action.is_high_energy() || self.parameters.energy_level == Some(EnergyLevel::High)
    }

    /// Default response used when reasoning gives up.
    pub fn fallback() -> Self {
        Self::calming("Reasoning unavailable; using the default calming response.", FALLBACK_SCRIPT)
    }

    /// Minimal pre-approved response that bypasses reasoning entirely.
    pub fn safe_mode() -> Self {
        Self::calming("Safe mode engaged; using the pre-approved response.", SAFE_MODE_SCRIPT)
    }

    fn calming(thought: &str, script: &str) -> Self {
        let mut decision = Self::new(thought, AgentAction::SoothingTalk, Confidence::FULL);
        decision.goals_considered = vec![GoalType::Safety, GoalType::Relaxation];
        decision.parameters.energy_level = Some(EnergyLevel::Low);
        decision.parameters.pacing = Some(Pacing::Slow);
        decision
            .parameters
            .extra
            .insert("script".to_string(), Value::from(script));
        decision
    }

    /// Text to speak, when the decision carries one.
    pub fn script(&self) -> Option<&str> {
        self.parameters.extra.get("script").and_then(Value::as_str)
    }
}
