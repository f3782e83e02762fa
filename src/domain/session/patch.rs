//! Partial updates to a session record.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::domain::agent::SessionPhase;
use crate::domain::foundation::Timestamp;

use super::goal::GoalStack;
use super::state::{SessionSnapshot, SessionState};

/// A set of field updates merged into the live record by `SessionStore::patch`.
///
/// Unset fields are left untouched. Context updates are merged key by key
/// (`None` removes the key), so two writers touching different context keys
/// never clobber each other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub phase: Option<SessionPhase>,
    pub active_goals: Option<GoalStack>,
    pub last_suggested_theme: Option<Option<String>>,
    pub session_start_time: Option<Timestamp>,
    pub context: BTreeMap<String, Option<Value>>,
}

impl SessionPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(mut self, phase: SessionPhase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn active_goals(mut self, goals: GoalStack) -> Self {
        self.active_goals = Some(goals);
        self
    }

    pub fn suggested_theme(mut self, theme: Option<String>) -> Self {
        self.last_suggested_theme = Some(theme);
        self
    }

    pub fn session_start_time(mut self, at: Timestamp) -> Self {
        self.session_start_time = Some(at);
        self
    }

    pub fn context_value(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), Some(value.into()));
        self
    }

    pub fn remove_context(mut self, key: &str) -> Self {
        self.context.insert(key.to_string(), None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.phase.is_none()
            && self.active_goals.is_none()
            && self.last_suggested_theme.is_none()
            && self.session_start_time.is_none()
            && self.context.is_empty()
    }

    /// Merges this patch into `current`, returning the new body.
    ///
    /// History and timestamps are untouched; the store commits the result.
    pub fn apply_to(&self, current: &SessionState) -> SessionState {
        let mut next = current.clone();
        if let Some(phase) = self.phase {
            next.phase = phase;
        }
        if let Some(goals) = &self.active_goals {
            next.active_goals = goals.clone();
        }
        if let Some(theme) = &self.last_suggested_theme {
            next.last_suggested_theme = theme.clone();
        }
        if let Some(start) = self.session_start_time {
            next.session_start_time = Some(start);
        }
        for (key, value) in &self.context {
            match value {
                Some(value) => next.context.set(key, value.clone()),
                None => {
                    next.context.remove(key);
                }
            }
        }
        next
    }

    /// Undoes the write that turned `before` into `written`, as far as
    /// `live` still shows it.
    ///
    /// Only fields that the write changed and that nobody has touched since
    /// are restored; later writes by other handlers are kept.
    pub fn reverting(before: &SessionSnapshot, written: &SessionState, live: &SessionState) -> Self {
        let mut patch = Self::new();
        if written.phase != before.phase && live.phase == written.phase {
            patch = patch.phase(before.phase);
        }
        if written.active_goals != before.active_goals && live.active_goals == written.active_goals {
            patch = patch.active_goals(before.active_goals.clone());
        }
        if written.last_suggested_theme != before.last_suggested_theme
            && live.last_suggested_theme == written.last_suggested_theme
        {
            patch = patch.suggested_theme(before.last_suggested_theme.clone());
        }

        let keys: std::collections::BTreeSet<&String> = written
            .context
            .iter()
            .chain(before.context.iter())
            .map(|(key, _)| key)
            .collect();
        for key in keys {
            let wrote = written.context.get(key);
            if wrote == before.context.get(key) || live.context.get(key) != wrote {
                continue;
            }
            patch.context.insert(key.clone(), before.context.get(key).cloned());
        }
        patch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{SessionId, UserId};
    use crate::domain::session::context_keys;

    fn state() -> SessionState {
        let mut state =
            SessionState::new(SessionId::new("s-1").unwrap(), UserId::new("u-1").unwrap());
        state.context.set_counter(context_keys::TURN_COUNT, 4);
        state.last_suggested_theme = Some("dragons".to_string());
        state
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let patch = SessionPatch::new();
        assert!(patch.is_empty());
        assert_eq!(patch.apply_to(&state()), state());
    }

    #[test]
    fn patch_sets_only_given_fields() {
        let next = SessionPatch::new()
            .phase(SessionPhase::Storytelling)
            .apply_to(&state());
        assert_eq!(next.phase, SessionPhase::Storytelling);
        assert_eq!(next.last_suggested_theme.as_deref(), Some("dragons"));
    }

    #[test]
    fn patch_can_clear_theme() {
        let next = SessionPatch::new().suggested_theme(None).apply_to(&state());
        assert!(next.last_suggested_theme.is_none());
    }

    #[test]
    fn context_updates_merge_per_key() {
        let next = SessionPatch::new()
            .context_value(context_keys::INTERVENTION_COUNT, 2)
            .apply_to(&state());
        assert_eq!(next.context.counter(context_keys::TURN_COUNT), 4);
        assert_eq!(next.context.counter(context_keys::INTERVENTION_COUNT), 2);
    }

    #[test]
    fn context_removal_drops_key() {
        let next = SessionPatch::new()
            .remove_context(context_keys::TURN_COUNT)
            .apply_to(&state());
        assert!(next.context.get(context_keys::TURN_COUNT).is_none());
    }

    mod reverting {
        use super::*;

        fn written() -> (SessionSnapshot, SessionState) {
            let before = state();
            let written = SessionPatch::new()
                .phase(SessionPhase::Onboarding)
                .suggested_theme(None)
                .context_value(context_keys::TURN_COUNT, 5)
                .context_value(context_keys::LAST_REJECTED_THEME, "dragons")
                .apply_to(&before);
            (before.snapshot(), written)
        }

        #[test]
        fn untouched_write_is_fully_reverted() {
            let (before, written) = written();
            let reverted = SessionPatch::reverting(&before, &written, &written).apply_to(&written);
            assert_eq!(reverted.phase, SessionPhase::Idle);
            assert_eq!(reverted.last_suggested_theme.as_deref(), Some("dragons"));
            assert_eq!(reverted.context.counter(context_keys::TURN_COUNT), 4);
            assert!(reverted.context.get(context_keys::LAST_REJECTED_THEME).is_none());
        }

        #[test]
        fn later_writes_by_others_survive() {
            let (before, written) = written();
            let live = SessionPatch::new()
                .phase(SessionPhase::Asleep)
                .context_value(context_keys::MINUTES_TO_SLEEP, 12)
                .apply_to(&written);

            let reverted = SessionPatch::reverting(&before, &written, &live).apply_to(&live);

            assert_eq!(reverted.phase, SessionPhase::Asleep);
            assert_eq!(reverted.context.counter(context_keys::MINUTES_TO_SLEEP), 12);
            assert_eq!(reverted.context.counter(context_keys::TURN_COUNT), 4);
        }

        #[test]
        fn no_write_means_nothing_to_revert() {
            let before = state();
            assert!(SessionPatch::reverting(&before.snapshot(), &before, &before).is_empty());
        }
    }
}
