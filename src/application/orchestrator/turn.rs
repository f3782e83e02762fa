//! The turn loop: observe, reason, arbitrate, then commit, recover or abort.
//!
//! Every exit is an explicit branch producing a [`TurnOutcome`]. Failures
//! of the reasoning backend go through the recovery engine; anything else
//! that goes wrong (a store error, a panic) is caught in `conduct_turn` and
//! answered with the safe-mode decision.

use futures::FutureExt;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::domain::agent::{
    ArbitrationContext, ArbitrationEngine, CorrectionAction, Decision, FailureEvent, FailureType,
    FeedbackSignal, PhaseMachine, PhaseSignal, ReasoningTrace, ResilienceMeta, SessionPhase,
    TimeOfDay,
};
use crate::domain::foundation::{SessionId, Timestamp, UserId};
use crate::domain::session::{context_keys, Goal, GoalType, SessionPatch, SessionState};
use crate::ports::{MemoryContext, MemoryType, Observation, Outcome, ReasoningError};

use super::error::OrchestratorError;
use super::observation::{build_observation, summarize_memory};
use super::outcome::{FailureMode, TurnOutcome};
use super::Orchestrator;

const MEMORY_RECALL_LIMIT: usize = 3;
const THEME_STATS_LIMIT: usize = 3;

/// A goal the client wants the session to work towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalRequest {
    #[serde(rename = "type")]
    pub goal_type: GoalType,
    pub target_minutes: u32,
}

/// One inbound stimulus for a session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnCommand {
    pub session_id: SessionId,
    pub user_id: UserId,
    #[serde(default)]
    pub message: Option<String>,
    /// Explicit client signal, e.g. `WAKE_UP`.
    #[serde(default)]
    pub trigger: Option<PhaseSignal>,
    /// Hour of day (0-23) where the child is.
    #[serde(default)]
    pub local_hour: Option<u32>,
    /// Goals to push onto the session's stack, bottom first.
    #[serde(default)]
    pub goals: Vec<GoalRequest>,
    /// Opaque environment values passed to the backend.
    #[serde(default)]
    pub environment: Map<String, Value>,
}

impl TurnCommand {
    pub fn message(session_id: SessionId, user_id: UserId, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::empty(session_id, user_id)
        }
    }

    pub fn trigger(session_id: SessionId, user_id: UserId, signal: PhaseSignal) -> Self {
        Self {
            trigger: Some(signal),
            ..Self::empty(session_id, user_id)
        }
    }

    fn empty(session_id: SessionId, user_id: UserId) -> Self {
        Self {
            session_id,
            user_id,
            message: None,
            trigger: None,
            local_hour: None,
            goals: Vec::new(),
            environment: Map::new(),
        }
    }

    pub fn with_environment(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.environment.insert(key.to_string(), value.into());
        self
    }

    pub fn with_local_hour(mut self, hour: u32) -> Self {
        self.local_hour = Some(hour);
        self
    }

    pub fn with_goal(mut self, goal_type: GoalType, target_minutes: u32) -> Self {
        self.goals.push(GoalRequest {
            goal_type,
            target_minutes,
        });
        self
    }

    /// The child's time of day; the server clock (UTC) when the client sent
    /// no valid hour.
    pub fn time_of_day(&self, now: Timestamp) -> TimeOfDay {
        match self.local_hour.filter(|hour| *hour < 24) {
            Some(hour) => TimeOfDay::from_hour(hour),
            None => TimeOfDay::at(now),
        }
    }
}

/// Failures seen so far in one turn.
#[derive(Debug, Default)]
struct RecoveryLedger {
    cost_usd: f64,
    last_failure: Option<FailureType>,
    last_correction: Option<CorrectionAction>,
}

impl RecoveryLedger {
    fn meta(&self, attempts: u32) -> Option<ResilienceMeta> {
        self.last_failure.map(|failure| ResilienceMeta {
            failure_encountered: Some(failure),
            correction_attempted: self.last_correction,
            recovery_cost_usd: self.cost_usd,
            attempts,
        })
    }
}

/// Memory writes implied by the feedback in a turn's message.
///
/// Held back until the turn is answered, so an aborted turn leaves memory
/// untouched just like it leaves the session.
#[derive(Debug, Default, PartialEq)]
struct PendingFeedback {
    rejected: Option<String>,
    accepted: Option<String>,
    preferred_over: Option<String>,
}

impl Orchestrator {
    /// Conducts one turn. Never fails: errors and panics become safe mode.
    pub async fn conduct_turn(&self, command: TurnCommand) -> TurnOutcome {
        let session_id = command.session_id.clone();
        let user_id = command.user_id.clone();

        let reason = match AssertUnwindSafe(self.run_turn(command)).catch_unwind().await {
            Ok(Ok(outcome)) => return outcome,
            Ok(Err(err)) => {
                error!(session_id = %session_id, error = %err, "Turn failed, engaging safe mode");
                err.to_string()
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(session_id = %session_id, panic = %message, "Turn panicked, engaging safe mode");
                message
            }
        };

        let decision = Decision::safe_mode();
        let trace = ReasoningTrace::new(session_id, user_id, decision.clone()).with_resilience(
            ResilienceMeta {
                failure_encountered: Some(FailureType::classify(&reason)),
                correction_attempted: Some(CorrectionAction::DegradeService),
                recovery_cost_usd: 0.0,
                attempts: 0,
            },
        );
        self.emit(&trace).await;
        TurnOutcome::Failed {
            mode: FailureMode::SafeMode,
            decision,
            trace,
        }
    }

    async fn run_turn(&self, command: TurnCommand) -> Result<TurnOutcome, OrchestratorError> {
        let now = Timestamp::now();
        let memory_ctx = MemoryContext::new(command.user_id.clone(), command.session_id.clone());

        self.ensure_started(&command, now).await?;
        let feedback = command
            .message
            .as_deref()
            .and_then(|message| self.feedback.detect(message));

        let mut pending = PendingFeedback::default();
        let state = self
            .sessions
            .update(&command.session_id, &mut |live: &SessionState| {
                let (patch, effects) = stage_turn(live, &command, feedback);
                pending = effects;
                Some(patch)
            })
            .await?;

        let outcome = self.deliberate(&state, &command, now, &memory_ctx).await;
        if outcome.failure_mode() == Some(FailureMode::Abort) {
            debug!(session_id = %state.session_id, "Discarding feedback of aborted turn");
        } else {
            self.apply_feedback(&pending, &memory_ctx).await;
        }
        Ok(outcome)
    }

    /// Quality gate, then the bounded reasoning loop over the staged record.
    async fn deliberate(
        &self,
        state: &SessionState,
        command: &TurnCommand,
        now: Timestamp,
        memory_ctx: &MemoryContext,
    ) -> TurnOutcome {
        let interventions = state.context.counter(context_keys::INTERVENTION_COUNT);
        if interventions > self.config.max_interventions {
            let event = FailureEvent::new(
                FailureType::QualityBreach,
                format!(
                    "{} interventions exceed the limit of {}",
                    interventions, self.config.max_interventions
                ),
                0,
                0.0,
            );
            let plan = self.recovery.assess(&event);
            warn!(
                session_id = %state.session_id,
                interventions,
                correction = %plan.action,
                "Quality gate tripped"
            );
            let ledger = RecoveryLedger {
                last_failure: Some(FailureType::QualityBreach),
                last_correction: Some(plan.action),
                ..RecoveryLedger::default()
            };
            return self.finish_degraded(state, plan.action, &ledger, 0).await;
        }

        let summary = self
            .memory_summary(command.message.as_deref().unwrap_or_default(), memory_ctx)
            .await;
        let observation = build_observation(state, command, summary, now);
        let arbitration = ArbitrationContext::new(state.phase, command.time_of_day(now))
            .with_active_goals(state.active_goals.goal_types());

        let mut ledger = RecoveryLedger::default();
        let mut system_prompt = self.config.system_prompt.clone();
        let mut attempt: u32 = 0;

        loop {
            debug!(session_id = %state.session_id, attempt, "Reasoning attempt");
            let err = match self.reason(&system_prompt, &observation).await {
                Ok(decision) => {
                    let decision = ArbitrationEngine::arbitrate(decision, &arbitration);
                    return self.commit_turn(state, decision, ledger, attempt + 1).await;
                }
                Err(err) => err,
            };

            let failure_type = match err.failure_type() {
                FailureType::Unknown => FailureType::classify(&err.message),
                hinted => hinted,
            };
            let event = FailureEvent::new(failure_type, err.message.clone(), attempt, ledger.cost_usd);
            let mut plan = self.recovery.assess(&event);
            if plan.action.retries() && attempt + 1 >= self.recovery.max_attempts() {
                plan = self.recovery.assess(&FailureEvent {
                    attempt: attempt + 1,
                    ..event
                });
            }

            warn!(
                session_id = %state.session_id,
                attempt,
                failure_type = %failure_type,
                correction = %plan.action,
                cost_usd = ledger.cost_usd,
                error = %err,
                "Reasoning attempt failed"
            );
            ledger.last_failure = Some(failure_type);
            ledger.last_correction = Some(plan.action);

            if !plan.action.retries() {
                return self
                    .finish_degraded(state, plan.action, &ledger, attempt + 1)
                    .await;
            }

            ledger.cost_usd += plan.estimated_cost_usd;
            if plan.action == CorrectionAction::SelfCorrect {
                system_prompt = correction_prompt(&self.config.system_prompt, &err);
            }
            let backoff = self.backoff.clamp(plan.backoff_ms());
            debug!(
                session_id = %state.session_id,
                backoff_ms = backoff.as_millis() as u64,
                "Backing off before next attempt"
            );
            sleep(backoff).await;
            attempt += 1;
        }
    }

    /// Creates and starts the session on first use.
    async fn ensure_started(&self, command: &TurnCommand, now: Timestamp) -> Result<(), OrchestratorError> {
        if self.sessions.get(&command.session_id).await?.is_some() {
            return Ok(());
        }

        let mut state = SessionState::new(command.session_id.clone(), command.user_id.clone());
        state.session_start_time = Some(now);
        state.phase = PhaseMachine::next(state.phase, PhaseSignal::Start);
        self.sessions.set(&command.session_id, state).await?;
        info!(session_id = %command.session_id, user_id = %command.user_id, "Session started");
        Ok(())
    }

    /// Calls the backend under the timeout and validates what comes back.
    async fn reason(
        &self,
        system_prompt: &str,
        observation: &Observation,
    ) -> Result<Decision, ReasoningError> {
        let limit = self.config.reasoning_timeout();
        let decision = timeout(limit, self.reasoning.think(system_prompt, observation))
            .await
            .map_err(|_| {
                ReasoningError::classified(
                    FailureType::NetworkTimeout,
                    format!("Reasoning timed out after {}s", limit.as_secs()),
                )
            })??;
        decision
            .validate()
            .map_err(|e| ReasoningError::classified(FailureType::SchemaDrift, e.to_string()))?;
        Ok(decision)
    }

    /// Persists the turn's effects, then emits its trace.
    ///
    /// A failed write answers the turn in safe mode instead; only that
    /// answer is traced.
    async fn commit_turn(
        &self,
        state: &SessionState,
        decision: Decision,
        mut ledger: RecoveryLedger,
        attempts: u32,
    ) -> TurnOutcome {
        let mut trace =
            ReasoningTrace::new(state.session_id.clone(), state.user_id.clone(), decision.clone());
        if let Some(meta) = ledger.meta(attempts) {
            trace = trace.with_resilience(meta);
        }
        let theme = decision
            .action
            .is_content_suggestion()
            .then(|| decision.parameters.theme.as_deref().map(str::trim))
            .flatten()
            .filter(|theme| !theme.is_empty())
            .map(str::to_string);

        let mut phase = state.phase;
        let persisted = self
            .sessions
            .update(&state.session_id, &mut |live: &SessionState| {
                phase = committed_phase(live.phase, &decision);
                let mut patch = SessionPatch::new()
                    .phase(phase)
                    .context_value(context_keys::TRACE_ID, trace.trace_id.to_string());
                if let Some(theme) = &theme {
                    patch = patch.suggested_theme(Some(theme.clone()));
                }
                Some(patch)
            })
            .await;

        if let Err(err) = persisted {
            error!(session_id = %state.session_id, error = %err, "Failed to persist turn, engaging safe mode");
            ledger.last_failure = Some(FailureType::classify(&err.to_string()));
            ledger.last_correction = Some(CorrectionAction::DegradeService);
            return self
                .finish_degraded(state, CorrectionAction::DegradeService, &ledger, attempts)
                .await;
        }

        info!(
            session_id = %state.session_id,
            action = %decision.action,
            confidence = %decision.confidence,
            phase = %phase,
            "Turn committed"
        );
        self.emit(&trace).await;
        if attempts == 1 {
            TurnOutcome::Decided { decision, trace }
        } else {
            TurnOutcome::Recovered { decision, trace }
        }
    }

    /// Answers a turn that reasoning could not serve.
    async fn finish_degraded(
        &self,
        state: &SessionState,
        action: CorrectionAction,
        ledger: &RecoveryLedger,
        attempts: u32,
    ) -> TurnOutcome {
        let (mode, decision) = match action {
            CorrectionAction::DegradeService => (FailureMode::SafeMode, Decision::safe_mode()),
            CorrectionAction::Abort => (FailureMode::Abort, Decision::fallback()),
            _ => (FailureMode::Fallback, Decision::fallback()),
        };

        if mode == FailureMode::Abort {
            self.undo_staging(state).await;
        }

        let mut trace =
            ReasoningTrace::new(state.session_id.clone(), state.user_id.clone(), decision.clone());
        if let Some(meta) = ledger.meta(attempts) {
            trace = trace.with_resilience(meta);
        }
        self.emit(&trace).await;

        warn!(session_id = %state.session_id, mode = ?mode, "Turn answered with degraded response");
        TurnOutcome::Failed {
            mode,
            decision,
            trace,
        }
    }

    /// Removes the staging write of an aborted turn.
    ///
    /// Rolls back while the staged record is still live; once another
    /// handler has written on top of it, reverts only the staged fields.
    async fn undo_staging(&self, staged: &SessionState) {
        let session_id = &staged.session_id;
        match self.sessions.rollback_if_current(session_id, staged.revision).await {
            Ok(Some(_)) => {
                info!(session_id = %session_id, "Aborted turn rolled back");
                return;
            }
            Ok(None) => {}
            Err(err) => {
                error!(session_id = %session_id, error = %err, "Rollback after abort failed");
                return;
            }
        }

        let Some(before) = staged.history.newest().cloned() else {
            return;
        };
        let reverted = self
            .sessions
            .update(session_id, &mut |live: &SessionState| {
                let patch = SessionPatch::reverting(&before, staged, live);
                (!patch.is_empty()).then_some(patch)
            })
            .await;
        match reverted {
            Ok(_) => info!(session_id = %session_id, "Aborted turn reverted around a later write"),
            Err(err) => error!(session_id = %session_id, error = %err, "Reverting aborted turn failed"),
        }
    }

    async fn apply_feedback(&self, pending: &PendingFeedback, ctx: &MemoryContext) {
        if let Some(theme) = &pending.rejected {
            info!(session_id = %ctx.session_id, theme = %theme, "Suggested theme rejected");
            self.record_outcome(theme, Outcome::Negative, ctx).await;
        }
        if let Some(theme) = &pending.accepted {
            info!(session_id = %ctx.session_id, theme = %theme, "Suggested theme accepted");
            self.record_outcome(theme, Outcome::Positive, ctx).await;
            if let Some(loser) = &pending.preferred_over {
                self.record_preference(theme, loser, ctx).await;
            }
            self.remember(&format!("Enjoyed a story about {}", theme), ctx)
                .await;
        }
    }

    async fn memory_summary(&self, query: &str, ctx: &MemoryContext) -> String {
        let records = self
            .memory
            .retrieve(query, ctx, MemoryType::Episodic, MEMORY_RECALL_LIMIT)
            .await
            .unwrap_or_else(|err| {
                warn!(session_id = %ctx.session_id, error = %err, "Memory recall failed");
                Vec::new()
            });
        let stats = self
            .memory
            .theme_stats(ctx, THEME_STATS_LIMIT)
            .await
            .unwrap_or_else(|err| {
                warn!(session_id = %ctx.session_id, error = %err, "Theme stats unavailable");
                Vec::new()
            });
        summarize_memory(&records, &stats)
    }

    pub(super) async fn record_outcome(&self, theme: &str, outcome: Outcome, ctx: &MemoryContext) {
        if let Err(err) = self.memory.track_outcome(theme, outcome, ctx).await {
            warn!(session_id = %ctx.session_id, theme, error = %err, "Failed to record theme outcome");
        }
    }

    async fn record_preference(&self, winner: &str, loser: &str, ctx: &MemoryContext) {
        match self.memory.track_preference_pair(winner, loser, ctx).await {
            Ok(()) => debug!(session_id = %ctx.session_id, winner, loser, "Preference pair recorded"),
            Err(err) => warn!(session_id = %ctx.session_id, error = %err, "Failed to record preference pair"),
        }
    }

    pub(super) async fn remember(&self, content: &str, ctx: &MemoryContext) {
        if let Err(err) = self.memory.store(content, MemoryType::Episodic, ctx).await {
            warn!(session_id = %ctx.session_id, error = %err, "Failed to store memory");
        }
    }
}

/// Builds the per-turn staging write from the live record.
fn stage_turn(
    live: &SessionState,
    command: &TurnCommand,
    feedback: Option<FeedbackSignal>,
) -> (SessionPatch, PendingFeedback) {
    let mut pending = PendingFeedback::default();
    let mut patch = SessionPatch::new().context_value(
        context_keys::TURN_COUNT,
        live.context.counter(context_keys::TURN_COUNT) + 1,
    );

    if let Some(signal) = command.trigger {
        let phase = PhaseMachine::next(live.phase, signal);
        if phase != live.phase {
            patch = patch.phase(phase);
        }
    }

    if !command.goals.is_empty() {
        let mut goals = live.active_goals.clone();
        for request in &command.goals {
            if goals.iter().any(|goal| goal.goal_type == request.goal_type) {
                continue;
            }
            if let Err(err) = goals.push(Goal::new(request.goal_type, request.target_minutes)) {
                warn!(
                    session_id = %live.session_id,
                    goal_type = %request.goal_type,
                    error = %err,
                    "Goal not added"
                );
            }
        }
        if goals != live.active_goals {
            patch = patch.active_goals(goals);
        }
    }

    match (feedback, live.last_suggested_theme.as_deref()) {
        (Some(FeedbackSignal::Rejected), theme) => {
            patch = patch.context_value(
                context_keys::INTERVENTION_COUNT,
                live.context.counter(context_keys::INTERVENTION_COUNT) + 1,
            );
            if let Some(theme) = theme {
                pending.rejected = Some(theme.to_string());
                patch = patch
                    .suggested_theme(None)
                    .context_value(context_keys::LAST_REJECTED_THEME, theme);
            }
        }
        (Some(FeedbackSignal::Accepted), Some(theme)) => {
            pending.accepted = Some(theme.to_string());
            pending.preferred_over = live
                .context
                .get_str(context_keys::LAST_REJECTED_THEME)
                .filter(|loser| *loser != theme)
                .map(str::to_string);
            patch = patch
                .suggested_theme(None)
                .remove_context(context_keys::LAST_REJECTED_THEME);
        }
        _ => {}
    }

    (patch, pending)
}

/// Phase after a committed turn: `TURN_COMPLETED`, then the action's signal.
fn committed_phase(current: SessionPhase, decision: &Decision) -> SessionPhase {
    let phase = PhaseMachine::next(current, PhaseSignal::TurnCompleted);
    match decision.action.phase_signal() {
        Some(signal) => PhaseMachine::next(phase, signal),
        None => phase,
    }
}

fn correction_prompt(base: &str, err: &ReasoningError) -> String {
    format!(
        "{}\n\nYour previous reply could not be used ({}). Reply again with exactly one JSON object in the required shape and nothing else.",
        base, err.message
    )
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
