//! Builds what the reasoning backend is shown for a turn.

use crate::domain::foundation::{StateMachine, Timestamp};
use crate::domain::session::{context_keys, SessionState};
use crate::ports::{MemoryRecord, Observation, ThemeStat};

use super::turn::TurnCommand;

/// Assembles the observation from the staged session and the command.
pub(crate) fn build_observation(
    state: &SessionState,
    command: &TurnCommand,
    memory_summary: String,
    now: Timestamp,
) -> Observation {
    Observation {
        message: command.message.clone(),
        trigger: command.trigger,
        phase: state.phase,
        phase_directive: state.phase.directive().to_string(),
        reachable_phases: state.phase.valid_transitions(),
        active_goal: state.active_goals.active().cloned(),
        turn_count: state.context.counter(context_keys::TURN_COUNT),
        minutes_elapsed: state.minutes_elapsed(now),
        last_suggested_theme: state.last_suggested_theme.clone(),
        memory_summary,
        environment: command.environment.clone(),
    }
}

/// Renders theme preferences and recalled memories as plain text.
///
/// Returns an empty string when there is nothing to say.
pub(crate) fn summarize_memory(records: &[MemoryRecord], stats: &[ThemeStat]) -> String {
    let mut lines = Vec::new();
    if !stats.is_empty() {
        let themes: Vec<String> = stats
            .iter()
            .map(|s| format!("{} ({:.1})", s.theme, s.score))
            .collect();
        lines.push(format!("Theme preferences: {}", themes.join(", ")));
    }
    if !records.is_empty() {
        lines.push("Relevant memories:".to_string());
        lines.extend(records.iter().map(|r| format!("- {}", r.content)));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::{PhaseSignal, SessionPhase};
    use crate::domain::foundation::{SessionId, UserId};
    use crate::domain::session::{Goal, GoalType};
    use crate::ports::MemoryType;

    fn state() -> SessionState {
        let mut state =
            SessionState::new(SessionId::new("s-1").unwrap(), UserId::new("u-1").unwrap());
        state.phase = SessionPhase::Onboarding;
        state.context.set_counter(context_keys::TURN_COUNT, 2);
        state
            .active_goals
            .push(Goal::new(GoalType::Relaxation, 10))
            .unwrap();
        state
    }

    #[test]
    fn observation_reflects_session() {
        let command = TurnCommand::message(
            SessionId::new("s-1").unwrap(),
            UserId::new("u-1").unwrap(),
            "hello",
        );
        let observation = build_observation(&state(), &command, String::new(), Timestamp::now());

        assert_eq!(observation.message.as_deref(), Some("hello"));
        assert_eq!(observation.phase, SessionPhase::Onboarding);
        assert_eq!(observation.turn_count, 2);
        assert_eq!(observation.reachable_phases, vec![SessionPhase::Storytelling]);
        assert_eq!(
            observation.active_goal.map(|g| g.goal_type),
            Some(GoalType::Relaxation)
        );
        assert!(observation.minutes_elapsed.is_none());
    }

    #[test]
    fn trigger_and_environment_pass_through() {
        let command = TurnCommand::trigger(
            SessionId::new("s-1").unwrap(),
            UserId::new("u-1").unwrap(),
            PhaseSignal::WakeUp,
        )
        .with_environment("room", "dark");
        let observation = build_observation(&state(), &command, String::new(), Timestamp::now());
        assert_eq!(observation.trigger, Some(PhaseSignal::WakeUp));
        assert_eq!(observation.environment["room"], "dark");
    }

    mod summary {
        use super::*;

        #[test]
        fn empty_inputs_give_empty_summary() {
            assert!(summarize_memory(&[], &[]).is_empty());
        }

        #[test]
        fn lists_themes_and_memories() {
            let stats = vec![ThemeStat {
                theme: "space".to_string(),
                score: 2.0,
            }];
            let records = vec![MemoryRecord {
                content: "Fell asleep to the space story".to_string(),
                memory_type: MemoryType::Episodic,
                session_id: SessionId::new("s-0").unwrap(),
                created_at: Timestamp::now(),
            }];
            let summary = summarize_memory(&records, &stats);
            assert!(summary.contains("space (2.0)"));
            assert!(summary.contains("- Fell asleep to the space story"));
        }
    }
}
