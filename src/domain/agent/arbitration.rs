//! Arbitration Engine - deterministic policy applied over backend decisions.
//!
//! The backend is nondeterministic, so safety and bedtime pacing are
//! re-asserted here after every call. Rules run in a fixed order and each
//! sees the corrections made by the ones before it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::Timestamp;
use crate::domain::session::GoalType;

use super::decision::{AgentAction, Decision, EnergyLevel, Pacing};
use super::phase::SessionPhase;

/// Confidence above which an adventure counts as a firm intent to excite.
const PACING_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Coarse time of day used by the pacing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    /// Buckets an hour of day (0-23).
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=20 => Self::Evening,
            _ => Self::Night,
        }
    }

    pub fn at(timestamp: Timestamp) -> Self {
        Self::from_hour(timestamp.hour())
    }

    /// Evening and night are bedtime.
    pub fn is_bedtime(&self) -> bool {
        matches!(self, Self::Evening | Self::Night)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        };
        f.write_str(s)
    }
}

/// Deterministic facts the rules are evaluated against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbitrationContext {
    pub time_of_day: TimeOfDay,
    pub child_age: Option<u8>,
    pub child_mood: Option<String>,
    /// Active goal types, head first.
    pub active_goals: Vec<GoalType>,
    pub current_phase: SessionPhase,
}

impl ArbitrationContext {
    pub fn new(current_phase: SessionPhase, time_of_day: TimeOfDay) -> Self {
        Self {
            time_of_day,
            child_age: None,
            child_mood: None,
            active_goals: Vec::new(),
            current_phase,
        }
    }

    pub fn with_active_goals(mut self, goals: Vec<GoalType>) -> Self {
        self.active_goals = goals;
        self
    }
}

/// Stateless rule engine. Safe to share across tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArbitrationEngine;

impl ArbitrationEngine {
    /// Returns the decision corrected by every rule, in order.
    pub fn arbitrate(decision: Decision, ctx: &ArbitrationContext) -> Decision {
        let mut decision = decision;
        Self::enforce_phase_lock(&mut decision, ctx);
        Self::enforce_phase_focus(&mut decision, ctx);
        Self::enforce_safety_floor(&mut decision);
        Self::enforce_bedtime_pacing(&mut decision, ctx);
        Self::fill_from_active_goals(&mut decision, ctx);
        decision
    }

    /// Wind-down never gets a high-energy action.
    fn enforce_phase_lock(decision: &mut Decision, ctx: &ArbitrationContext) {
        if ctx.current_phase != SessionPhase::WindDown || !decision.is_high_energy() {
            return;
        }
        let requested = decision.action.clone();
        decision.action = AgentAction::SoothingTalk;
        decision.parameters.energy_level = Some(EnergyLevel::Low);
        append_note(
            &mut decision.conflict_identified,
            format!("{} requested during WIND_DOWN", requested),
        );
        append_note(
            &mut decision.trade_off_made,
            "Replaced with SOOTHING_TALK at low energy to protect wind-down".to_string(),
        );
    }

    /// Storytelling must serve relaxation or education.
    fn enforce_phase_focus(decision: &mut Decision, ctx: &ArbitrationContext) {
        if ctx.current_phase != SessionPhase::Storytelling {
            return;
        }
        let focused = decision
            .goals_considered
            .iter()
            .any(|g| matches!(g, GoalType::Relaxation | GoalType::Education));
        if !focused {
            decision.goals_considered.push(GoalType::Relaxation);
        }
    }

    /// Safety is always considered, first.
    fn enforce_safety_floor(decision: &mut Decision) {
        if !decision.goals_considered.contains(&GoalType::Safety) {
            decision.goals_considered.insert(0, GoalType::Safety);
        }
    }

    /// Confident adventures at bedtime are slowed down.
    fn enforce_bedtime_pacing(decision: &mut Decision, ctx: &ArbitrationContext) {
        let excited_adventure = decision.action == AgentAction::AdventureStory
            && decision.confidence.exceeds(PACING_CONFIDENCE_THRESHOLD);
        if !ctx.time_of_day.is_bedtime() || !excited_adventure {
            return;
        }
        decision.parameters.energy_level = Some(EnergyLevel::Low);
        decision.parameters.pacing = Some(Pacing::Slow);
        append_note(
            &mut decision.trade_off_made,
            format!(
                "Adventure kept but slowed to low energy and slow pacing for the {}",
                ctx.time_of_day
            ),
        );
    }

    /// Backs the decision with the session's own goals when it is left with none.
    fn fill_from_active_goals(decision: &mut Decision, ctx: &ArbitrationContext) {
        if decision.goals_considered.is_empty() {
            decision.goals_considered = ctx.active_goals.clone();
        }
    }
}

fn append_note(slot: &mut Option<String>, note: String) {
    *slot = Some(match slot.take() {
        Some(existing) if !existing.is_empty() => format!("{}; {}", existing, note),
        _ => note,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Confidence;

    fn decision(action: AgentAction, confidence: f64) -> Decision {
        Decision::new("thinking", action, Confidence::new(confidence).unwrap())
    }

    fn ctx(phase: SessionPhase, time: TimeOfDay) -> ArbitrationContext {
        ArbitrationContext::new(phase, time)
    }

    mod phase_lock {
        use super::*;

        #[test]
        fn adventure_in_wind_down_becomes_soothing_talk() {
            let out = ArbitrationEngine::arbitrate(
                decision(AgentAction::AdventureStory, 0.9),
                &ctx(SessionPhase::WindDown, TimeOfDay::Afternoon),
            );
            assert_eq!(out.action, AgentAction::SoothingTalk);
            assert_eq!(out.parameters.energy_level, Some(EnergyLevel::Low));
            assert!(out.conflict_identified.unwrap().contains("ADVENTURE_STORY"));
            assert!(out.trade_off_made.is_some());
        }

        #[test]
        fn high_energy_parameter_in_wind_down_is_locked() {
            let mut d = decision(AgentAction::ContinueStory, 0.9);
            d.parameters.energy_level = Some(EnergyLevel::High);
            let out = ArbitrationEngine::arbitrate(d, &ctx(SessionPhase::WindDown, TimeOfDay::Night));
            assert_eq!(out.action, AgentAction::SoothingTalk);
        }

        #[test]
        fn calm_action_in_wind_down_is_untouched() {
            let out = ArbitrationEngine::arbitrate(
                decision(AgentAction::BreathingExercise, 0.9),
                &ctx(SessionPhase::WindDown, TimeOfDay::Night),
            );
            assert_eq!(out.action, AgentAction::BreathingExercise);
            assert!(out.conflict_identified.is_none());
        }

        #[test]
        fn adventure_outside_wind_down_is_allowed() {
            let out = ArbitrationEngine::arbitrate(
                decision(AgentAction::AdventureStory, 0.9),
                &ctx(SessionPhase::Onboarding, TimeOfDay::Morning),
            );
            assert_eq!(out.action, AgentAction::AdventureStory);
        }
    }

    mod goals {
        use super::*;

        #[test]
        fn storytelling_adds_relaxation_when_unfocused() {
            let mut d = decision(AgentAction::ContinueStory, 0.7);
            d.goals_considered = vec![GoalType::Bonding];
            let out = ArbitrationEngine::arbitrate(d, &ctx(SessionPhase::Storytelling, TimeOfDay::Morning));
            assert_eq!(
                out.goals_considered,
                vec![GoalType::Safety, GoalType::Bonding, GoalType::Relaxation]
            );
        }

        #[test]
        fn storytelling_keeps_education_focus() {
            let mut d = decision(AgentAction::ContinueStory, 0.7);
            d.goals_considered = vec![GoalType::Education];
            let out = ArbitrationEngine::arbitrate(d, &ctx(SessionPhase::Storytelling, TimeOfDay::Morning));
            assert!(!out.goals_considered.contains(&GoalType::Relaxation));
        }

        #[test]
        fn safety_is_prepended_once() {
            let mut d = decision(AgentAction::Greet, 0.7);
            d.goals_considered = vec![GoalType::Bonding, GoalType::Safety];
            let out = ArbitrationEngine::arbitrate(d, &ctx(SessionPhase::Onboarding, TimeOfDay::Morning));
            assert_eq!(out.goals_considered, vec![GoalType::Bonding, GoalType::Safety]);
        }

        #[test]
        fn safety_only_decision_is_not_padded_with_active_goals() {
            let context = ctx(SessionPhase::Onboarding, TimeOfDay::Morning)
                .with_active_goals(vec![GoalType::Relaxation, GoalType::Bonding]);
            let out = ArbitrationEngine::arbitrate(decision(AgentAction::Greet, 0.7), &context);
            assert_eq!(out.goals_considered, vec![GoalType::Safety]);

            let mut d = decision(AgentAction::Greet, 0.7);
            d.goals_considered = vec![GoalType::Safety];
            let out = ArbitrationEngine::arbitrate(d, &context);
            assert_eq!(out.goals_considered, vec![GoalType::Safety]);
        }

        #[test]
        fn empty_goal_list_takes_active_goals() {
            let mut d = decision(AgentAction::Greet, 0.7);
            let context = ctx(SessionPhase::Onboarding, TimeOfDay::Morning)
                .with_active_goals(vec![GoalType::Bonding]);
            ArbitrationEngine::fill_from_active_goals(&mut d, &context);
            assert_eq!(d.goals_considered, vec![GoalType::Bonding]);
        }

        #[test]
        fn own_goals_are_not_extended() {
            let mut d = decision(AgentAction::Greet, 0.7);
            d.goals_considered = vec![GoalType::Bonding];
            let context = ctx(SessionPhase::Onboarding, TimeOfDay::Morning)
                .with_active_goals(vec![GoalType::Education]);
            let out = ArbitrationEngine::arbitrate(d, &context);
            assert!(!out.goals_considered.contains(&GoalType::Education));
        }
    }

    mod pacing {
        use super::*;

        #[test]
        fn confident_adventure_at_night_is_slowed() {
            let mut d = decision(AgentAction::AdventureStory, 0.8);
            d.parameters.energy_level = Some(EnergyLevel::High);
            d.parameters.pacing = Some(Pacing::Fast);
            let out = ArbitrationEngine::arbitrate(d, &ctx(SessionPhase::Storytelling, TimeOfDay::Night));
            assert_eq!(out.action, AgentAction::AdventureStory);
            assert_eq!(out.parameters.energy_level, Some(EnergyLevel::Low));
            assert_eq!(out.parameters.pacing, Some(Pacing::Slow));
            assert!(out.trade_off_made.unwrap().contains("night"));
        }

        #[test]
        fn unsure_adventure_is_not_slowed() {
            let out = ArbitrationEngine::arbitrate(
                decision(AgentAction::AdventureStory, 0.5),
                &ctx(SessionPhase::Storytelling, TimeOfDay::Evening),
            );
            assert!(out.parameters.pacing.is_none());
        }

        #[test]
        fn daytime_adventure_is_not_slowed() {
            let out = ArbitrationEngine::arbitrate(
                decision(AgentAction::AdventureStory, 0.9),
                &ctx(SessionPhase::Storytelling, TimeOfDay::Afternoon),
            );
            assert!(out.parameters.pacing.is_none());
        }
    }

    #[test]
    fn time_of_day_buckets() {
        assert_eq!(TimeOfDay::from_hour(7), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(13), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(19), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(23), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(2), TimeOfDay::Night);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn any_action() -> impl Strategy<Value = AgentAction> {
            prop_oneof![
                Just(AgentAction::Greet),
                Just(AgentAction::SuggestTheme),
                Just(AgentAction::StartStory),
                Just(AgentAction::AdventureStory),
                Just(AgentAction::PlayGame),
                Just(AgentAction::SoothingTalk),
                Just(AgentAction::EndStory),
                "[A-Z_]{1,12}".prop_map(AgentAction::from),
            ]
        }

        fn any_goal() -> impl Strategy<Value = GoalType> {
            proptest::sample::select(vec![
                GoalType::Relaxation,
                GoalType::Bonding,
                GoalType::Education,
                GoalType::Safety,
            ])
        }

        fn any_energy() -> impl Strategy<Value = Option<EnergyLevel>> {
            proptest::option::of(proptest::sample::select(vec![
                EnergyLevel::Low,
                EnergyLevel::Medium,
                EnergyLevel::High,
            ]))
        }

        fn any_decision() -> impl Strategy<Value = Decision> {
            (
                any_action(),
                0.0f64..=1.0,
                proptest::collection::vec(any_goal(), 0..5),
                any_energy(),
            )
                .prop_map(|(action, confidence, goals, energy)| {
                    let mut d = Decision::new(
                        "generated",
                        action,
                        Confidence::new(confidence).unwrap_or_default(),
                    );
                    d.goals_considered = goals;
                    d.parameters.energy_level = energy;
                    d
                })
        }

        fn any_context() -> impl Strategy<Value = ArbitrationContext> {
            (
                proptest::sample::select(SessionPhase::ALL.to_vec()),
                0u32..24,
                proptest::collection::vec(any_goal(), 0..5),
            )
                .prop_map(|(phase, hour, goals)| {
                    ArbitrationContext::new(phase, TimeOfDay::from_hour(hour))
                        .with_active_goals(goals)
                })
        }

        proptest! {
            #[test]
            fn safety_is_always_considered(d in any_decision(), ctx in any_context()) {
                let out = ArbitrationEngine::arbitrate(d, &ctx);
                prop_assert!(out.goals_considered.contains(&GoalType::Safety));
            }

            #[test]
            fn wind_down_never_keeps_high_energy(d in any_decision(), hour in 0u32..24) {
                let ctx = ArbitrationContext::new(SessionPhase::WindDown, TimeOfDay::from_hour(hour));
                let high = d.is_high_energy();
                let out = ArbitrationEngine::arbitrate(d, &ctx);
                if high {
                    prop_assert_eq!(&out.action, &AgentAction::SoothingTalk);
                }
                prop_assert!(!out.is_high_energy());
            }

            #[test]
            fn goals_are_never_empty(d in any_decision(), ctx in any_context()) {
                let out = ArbitrationEngine::arbitrate(d, &ctx);
                prop_assert!(!out.goals_considered.is_empty());
            }
        }
    }
}
