//! SessionState - the versioned per-session conversation record.
//!
//! The store owns four fields of this record: `history`, `updated_at`,
//! `revision` and, on rollback, the whole body. The commit and rollback rules live here so
//! every store backend applies them identically.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::domain::agent::SessionPhase;
use crate::domain::foundation::{SessionId, Timestamp, UserId};

use super::goal::GoalStack;
use super::history::SnapshotHistory;

/// Well-known keys in [`SessionContext`].
pub mod context_keys {
    pub const TURN_COUNT: &str = "turn_count";
    pub const INTERVENTION_COUNT: &str = "intervention_count";
    pub const TRACE_ID: &str = "trace_id";
    pub const LAST_REJECTED_THEME: &str = "last_rejected_theme";
    pub const LAST_BEAT_STORY: &str = "last_beat_story";
    pub const LAST_BEAT_INDEX: &str = "last_beat_index";
    pub const MINUTES_TO_SLEEP: &str = "minutes_to_sleep";
}

/// Open string-keyed bag of counters and pass-through metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionContext(BTreeMap<String, Value>);

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a non-negative counter; missing or non-numeric values count as 0.
    pub fn counter(&self, key: &str) -> u64 {
        self.0.get(key).and_then(Value::as_u64).unwrap_or(0)
    }

    pub fn set_counter(&mut self, key: &str, value: u64) {
        self.0.insert(key.to_string(), Value::from(value));
    }

    /// Increments a counter and returns the new value.
    pub fn increment(&mut self, key: &str) -> u64 {
        let next = self.counter(key).saturating_add(1);
        self.set_counter(key, next);
        next
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A session record without its history.
///
/// This is what the history holds; it has no `history` field, so snapshots
/// can never nest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub phase: SessionPhase,
    pub active_goals: GoalStack,
    pub last_suggested_theme: Option<String>,
    pub context: SessionContext,
    pub session_start_time: Option<Timestamp>,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub revision: u64,
}

/// Live conversation state for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub phase: SessionPhase,
    pub active_goals: GoalStack,
    /// Theme most recently proposed by the agent, awaiting feedback.
    pub last_suggested_theme: Option<String>,
    pub context: SessionContext,
    /// Set once, on the first turn.
    pub session_start_time: Option<Timestamp>,
    /// Stamped by the store at commit time.
    pub updated_at: Timestamp,
    /// Bumped by the store on every write, rollbacks included.
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub history: SnapshotHistory,
}

impl SessionState {
    /// Creates a fresh, idle session.
    pub fn new(session_id: SessionId, user_id: UserId) -> Self {
        Self {
            session_id,
            user_id,
            phase: SessionPhase::Idle,
            active_goals: GoalStack::new(),
            last_suggested_theme: None,
            context: SessionContext::new(),
            session_start_time: None,
            updated_at: Timestamp::now(),
            revision: 0,
            history: SnapshotHistory::new(),
        }
    }

    /// Copy of this record with its history stripped.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            phase: self.phase,
            active_goals: self.active_goals.clone(),
            last_suggested_theme: self.last_suggested_theme.clone(),
            context: self.context.clone(),
            session_start_time: self.session_start_time,
            updated_at: self.updated_at,
            revision: self.revision,
        }
    }

    /// Rebuilds a live record from a snapshot and a history list.
    pub fn from_snapshot(snapshot: SessionSnapshot, history: SnapshotHistory) -> Self {
        Self {
            session_id: snapshot.session_id,
            user_id: snapshot.user_id,
            phase: snapshot.phase,
            active_goals: snapshot.active_goals,
            last_suggested_theme: snapshot.last_suggested_theme,
            context: snapshot.context,
            session_start_time: snapshot.session_start_time,
            updated_at: snapshot.updated_at,
            revision: snapshot.revision,
            history,
        }
    }

    /// Prepares this record to replace `previous` in the store.
    ///
    /// The previous record (if any) is snapshotted onto its own history,
    /// which becomes the history of the new record. Caller-supplied
    /// `history`, `updated_at` and `revision` are discarded.
    pub fn committed_over(mut self, previous: Option<&SessionState>, now: Timestamp) -> Self {
        self.revision = previous.map_or(1, |prev| prev.revision + 1);
        self.history = match previous {
            Some(prev) => {
                let mut history = prev.history.clone();
                history.push(prev.snapshot());
                history
            }
            None => SnapshotHistory::new(),
        };
        self.updated_at = now;
        self
    }

    /// Computes the record restored by rolling back up to `steps` versions.
    ///
    /// Returns `None` when there is nothing to roll back to. Asking for more
    /// steps than are available restores the oldest retained snapshot.
    pub fn rolled_back(&self, steps: usize, now: Timestamp) -> Option<SessionState> {
        if steps == 0 || self.history.is_empty() {
            return None;
        }
        let mut remaining = self.history.clone();
        let mut restored = None;
        for _ in 0..steps {
            match remaining.pop_newest() {
                Some(snapshot) => restored = Some(snapshot),
                None => break,
            }
        }
        let mut state = SessionState::from_snapshot(restored?, remaining);
        state.updated_at = now;
        state.revision = self.revision + 1;
        Some(state)
    }

    /// Elapsed minutes since the session started, if it has.
    pub fn minutes_elapsed(&self, now: Timestamp) -> Option<u64> {
        self.session_start_time.map(|start| now.minutes_since(&start))
    }
}
