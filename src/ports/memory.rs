//! Memory Port - long-term memory and learned theme preferences.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{SessionId, Timestamp, UserId};

/// Errors from the memory service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MemoryError {
    #[error("Memory service unavailable: {0}")]
    Unavailable(String),

    #[error("Memory backend error: {0}")]
    Backend(String),
}

/// Kind of stored memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemoryType {
    Episodic,
    Semantic,
    Procedural,
}

/// Whether a theme helped or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Positive,
    Negative,
}

/// Whose memory an operation touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryContext {
    pub user_id: UserId,
    pub session_id: SessionId,
}

impl MemoryContext {
    pub fn new(user_id: UserId, session_id: SessionId) -> Self {
        Self { user_id, session_id }
    }
}

/// A stored memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    pub content: String,
    pub memory_type: MemoryType,
    pub session_id: SessionId,
    pub created_at: Timestamp,
}

/// Learned score of a theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeStat {
    pub theme: String,
    pub score: f64,
}

/// Port for the long-term memory service.
#[async_trait]
pub trait MemoryPort: Send + Sync {
    /// Returns up to `limit` memories of `memory_type` relevant to `query`.
    async fn retrieve(
        &self,
        query: &str,
        ctx: &MemoryContext,
        memory_type: MemoryType,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, MemoryError>;

    async fn store(
        &self,
        content: &str,
        memory_type: MemoryType,
        ctx: &MemoryContext,
    ) -> Result<(), MemoryError>;

    /// Records whether a theme worked.
    async fn track_outcome(
        &self,
        theme: &str,
        outcome: Outcome,
        ctx: &MemoryContext,
    ) -> Result<(), MemoryError>;

    /// Top `limit` themes by score, best first.
    async fn theme_stats(
        &self,
        ctx: &MemoryContext,
        limit: usize,
    ) -> Result<Vec<ThemeStat>, MemoryError>;

    /// Records that `winner` was preferred over `loser`.
    async fn track_preference_pair(
        &self,
        winner: &str,
        loser: &str,
        ctx: &MemoryContext,
    ) -> Result<(), MemoryError>;
}
