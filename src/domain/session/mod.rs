//! Session Domain Module
//!
//! The per-session conversation record, its bounded goal stack and snapshot
//! history, and the partial-update type used for atomic merges.

mod goal;
mod history;
mod patch;
mod state;

pub use goal::{Goal, GoalStack, GoalStatus, GoalType};
pub use history::SnapshotHistory;
pub use patch::SessionPatch;
pub use state::{context_keys, SessionContext, SessionSnapshot, SessionState};
