//! Asynchronous session events: story beats and sleep cues.
//!
//! Events arrive at least once, so both handlers are idempotent. Each one
//! reads and writes the record in a single `SessionStore::update`, so the
//! duplicate check and the write see the same state even while a turn or
//! another event touches the session.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::agent::{
    AgentAction, Decision, PhaseMachine, PhaseSignal, ReasoningTrace, SessionPhase,
};
use crate::domain::foundation::{Confidence, Percentage, SessionId, Timestamp, UserId};
use crate::domain::session::{context_keys, Goal, SessionPatch, SessionState};
use crate::ports::{MemoryContext, Outcome};

use super::error::OrchestratorError;
use super::Orchestrator;

/// A story beat finished playing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeatCompletedEvent {
    pub story_id: String,
    pub beat_index: u32,
    pub total_beats: u32,
    pub session_id: SessionId,
    pub user_id: UserId,
}

/// A sensor or client believes the child fell asleep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepCueEvent {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub confidence: f64,
    pub cue: String,
}

/// What a beat event did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BeatOutcome {
    /// Progress was recorded; `achieved` holds the goal that completed.
    #[serde(rename_all = "camelCase")]
    Progressed {
        progress: Percentage,
        achieved: Option<Goal>,
        story_finished: bool,
    },
    /// The beat was already processed.
    Duplicate,
}

/// What a sleep cue did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SleepOutcome {
    #[serde(rename_all = "camelCase")]
    Applied {
        phase: SessionPhase,
        minutes_to_sleep: Option<u64>,
        credited_theme: Option<String>,
    },
    /// Confidence was under the configured threshold.
    BelowThreshold,
    /// The session was already asleep.
    AlreadyAsleep,
}

impl Orchestrator {
    /// Records goal progress for a completed beat.
    pub async fn handle_beat_completed(
        &self,
        event: BeatCompletedEvent,
    ) -> Result<BeatOutcome, OrchestratorError> {
        if event.total_beats == 0 {
            return Err(OrchestratorError::invalid_event("totalBeats must be positive"));
        }
        if event.beat_index >= event.total_beats {
            return Err(OrchestratorError::invalid_event(format!(
                "beatIndex {} out of range for {} beats",
                event.beat_index, event.total_beats
            )));
        }

        let progress = Percentage::from_ratio(event.beat_index + 1, event.total_beats)?;
        let story_finished = event.beat_index + 1 == event.total_beats;

        // `None` after the update means the beat was a redelivery.
        let mut recorded: Option<Option<Goal>> = None;
        self.sessions
            .update(&event.session_id, &mut |live: &SessionState| {
                if already_processed(live, &event) {
                    recorded = None;
                    return None;
                }
                let mut goals = live.active_goals.clone();
                recorded = Some(goals.record_progress(progress));

                let mut patch = SessionPatch::new()
                    .active_goals(goals)
                    .context_value(context_keys::LAST_BEAT_STORY, event.story_id.as_str())
                    .context_value(context_keys::LAST_BEAT_INDEX, event.beat_index);
                if story_finished {
                    patch = patch.phase(PhaseMachine::next(live.phase, PhaseSignal::StoryEnd));
                }
                Some(patch)
            })
            .await?;

        let Some(achieved) = recorded else {
            debug!(
                session_id = %event.session_id,
                story_id = %event.story_id,
                beat_index = event.beat_index,
                "Skipping redelivered beat"
            );
            return Ok(BeatOutcome::Duplicate);
        };

        debug!(
            session_id = %event.session_id,
            story_id = %event.story_id,
            progress = %progress,
            "Beat progress recorded"
        );

        if let Some(goal) = &achieved {
            info!(
                session_id = %event.session_id,
                goal_type = %goal.goal_type,
                target_minutes = goal.target_minutes,
                "Goal achieved"
            );
            let mut decision = Decision::new(
                format!("{} goal achieved after story {}", goal.goal_type, event.story_id),
                AgentAction::GoalAchieved,
                Confidence::FULL,
            );
            decision.goals_considered = vec![goal.goal_type];
            let trace = ReasoningTrace::new(event.session_id.clone(), event.user_id.clone(), decision);
            self.emit(&trace).await;
        }

        Ok(BeatOutcome::Progressed {
            progress,
            achieved,
            story_finished,
        })
    }

    /// Applies a sleep cue: moves to ASLEEP and credits the current theme.
    pub async fn handle_sleep_cue(
        &self,
        event: SleepCueEvent,
    ) -> Result<SleepOutcome, OrchestratorError> {
        let confidence = Confidence::new(event.confidence)?;
        if confidence.value() < self.config.min_sleep_confidence {
            debug!(
                session_id = %event.session_id,
                confidence = %confidence,
                cue = %event.cue,
                "Ignoring low-confidence sleep cue"
            );
            return Ok(SleepOutcome::BelowThreshold);
        }

        let now = Timestamp::now();
        let mut applied: Option<(SessionPhase, Option<u64>, Option<String>)> = None;
        self.sessions
            .update(&event.session_id, &mut |live: &SessionState| {
                if live.phase == SessionPhase::Asleep {
                    applied = None;
                    return None;
                }
                let phase = PhaseMachine::next(live.phase, PhaseSignal::SleepDetected);
                let minutes = live.minutes_elapsed(now);
                let mut patch = SessionPatch::new().phase(phase).suggested_theme(None);
                if let Some(minutes) = minutes {
                    patch = patch.context_value(context_keys::MINUTES_TO_SLEEP, minutes);
                }
                applied = Some((phase, minutes, live.last_suggested_theme.clone()));
                Some(patch)
            })
            .await?;

        let Some((phase, minutes_to_sleep, credited_theme)) = applied else {
            debug!(session_id = %event.session_id, cue = %event.cue, "Session already asleep");
            return Ok(SleepOutcome::AlreadyAsleep);
        };

        info!(
            session_id = %event.session_id,
            cue = %event.cue,
            confidence = %confidence,
            minutes_to_sleep = ?minutes_to_sleep,
            phase = %phase,
            "Sleep detected"
        );

        if let Some(theme) = &credited_theme {
            let ctx = MemoryContext::new(event.user_id.clone(), event.session_id.clone());
            // Sleep onset counts double.
            self.record_outcome(theme, Outcome::Positive, &ctx).await;
            self.record_outcome(theme, Outcome::Positive, &ctx).await;
            let memory = match minutes_to_sleep {
                Some(minutes) => format!("Fell asleep to a {} story after {} minutes", theme, minutes),
                None => format!("Fell asleep to a {} story", theme),
            };
            self.remember(&memory, &ctx).await;
        }

        Ok(SleepOutcome::Applied {
            phase,
            minutes_to_sleep,
            credited_theme,
        })
    }
}

fn already_processed(state: &SessionState, event: &BeatCompletedEvent) -> bool {
    let same_story = state.context.get_str(context_keys::LAST_BEAT_STORY) == Some(event.story_id.as_str());
    let last_index = state
        .context
        .get(context_keys::LAST_BEAT_INDEX)
        .and_then(serde_json::Value::as_u64);
    same_story && last_index.is_some_and(|last| u64::from(event.beat_index) <= last)
}
