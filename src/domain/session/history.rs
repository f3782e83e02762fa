//! Bounded snapshot history used for rollback.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::state::SessionSnapshot;

/// Capped, ordered list of prior session snapshots (oldest first).
///
/// Snapshots never carry a history of their own, so nesting is impossible by
/// construction. Pushing beyond [`SnapshotHistory::CAPACITY`] drops the oldest
/// entry; deserializing an oversized list keeps the newest entries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<SessionSnapshot>", into = "Vec<SessionSnapshot>")]
pub struct SnapshotHistory {
    entries: VecDeque<SessionSnapshot>,
}

impl SnapshotHistory {
    /// Maximum number of snapshots retained.
    pub const CAPACITY: usize = 10;

    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a snapshot, evicting the oldest one when full.
    pub fn push(&mut self, snapshot: SessionSnapshot) {
        while self.entries.len() >= Self::CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    /// Removes and returns the most recent snapshot.
    pub fn pop_newest(&mut self) -> Option<SessionSnapshot> {
        self.entries.pop_back()
    }

    /// The most recent snapshot.
    pub fn newest(&self) -> Option<&SessionSnapshot> {
        self.entries.back()
    }

    /// The oldest retained snapshot.
    pub fn oldest(&self) -> Option<&SessionSnapshot> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionSnapshot> {
        self.entries.iter()
    }
}

impl From<Vec<SessionSnapshot>> for SnapshotHistory {
    fn from(snapshots: Vec<SessionSnapshot>) -> Self {
        let mut history = SnapshotHistory::new();
        for snapshot in snapshots {
            history.push(snapshot);
        }
        history
    }
}

impl From<SnapshotHistory> for Vec<SessionSnapshot> {
    fn from(history: SnapshotHistory) -> Self {
        history.entries.into()
    }
}
