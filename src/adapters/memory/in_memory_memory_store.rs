//! In-Memory Memory Store Adapter
//!
//! Per-user theme scores, preference pairs and keyword-ranked memories.
//! Scores move by +1.0 per POSITIVE and -0.5 per NEGATIVE outcome.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{
    MemoryContext, MemoryError, MemoryPort, MemoryRecord, MemoryType, Outcome, ThemeStat,
};

const POSITIVE_WEIGHT: f64 = 1.0;
const NEGATIVE_WEIGHT: f64 = -0.5;

#[derive(Debug, Default)]
struct UserMemory {
    theme_scores: HashMap<String, f64>,
    preference_pairs: Vec<(String, String)>,
    records: Vec<MemoryRecord>,
}

/// In-memory memory service
#[derive(Debug, Clone, Default)]
pub struct InMemoryMemoryStore {
    users: Arc<RwLock<HashMap<UserId, UserMemory>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Current score of a theme; unknown themes score 0.
    pub async fn theme_score(&self, user_id: &UserId, theme: &str) -> f64 {
        self.users
            .read()
            .await
            .get(user_id)
            .and_then(|m| m.theme_scores.get(&normalize_theme(theme)).copied())
            .unwrap_or(0.0)
    }

    /// Recorded (winner, loser) pairs, oldest first.
    pub async fn preference_pairs(&self, user_id: &UserId) -> Vec<(String, String)> {
        self.users
            .read()
            .await
            .get(user_id)
            .map(|m| m.preference_pairs.clone())
            .unwrap_or_default()
    }

    /// Every stored memory for a user, oldest first.
    pub async fn records(&self, user_id: &UserId) -> Vec<MemoryRecord> {
        self.users
            .read()
            .await
            .get(user_id)
            .map(|m| m.records.clone())
            .unwrap_or_default()
    }

    fn check_available(&self) -> Result<(), MemoryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MemoryError::Unavailable("memory store disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MemoryPort for InMemoryMemoryStore {
    async fn retrieve(
        &self,
        query: &str,
        ctx: &MemoryContext,
        memory_type: MemoryType,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        self.check_available()?;
        let users = self.users.read().await;
        let Some(memory) = users.get(&ctx.user_id) else {
            return Ok(Vec::new());
        };

        let query_words = keywords(query);
        let mut ranked: Vec<(usize, usize, &MemoryRecord)> = memory
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.memory_type == memory_type)
            .map(|(position, r)| (keywords(&r.content).intersection(&query_words).count(), position, r))
            .filter(|(overlap, _, _)| query_words.is_empty() || *overlap > 0)
            .collect();
        // Best overlap first, newest first among equals
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

        Ok(ranked
            .into_iter()
            .take(limit)
            .map(|(_, _, r)| r.clone())
            .collect())
    }

    async fn store(
        &self,
        content: &str,
        memory_type: MemoryType,
        ctx: &MemoryContext,
    ) -> Result<(), MemoryError> {
        self.check_available()?;
        let mut users = self.users.write().await;
        users
            .entry(ctx.user_id.clone())
            .or_default()
            .records
            .push(MemoryRecord {
                content: content.to_string(),
                memory_type,
                session_id: ctx.session_id.clone(),
                created_at: Timestamp::now(),
            });
        Ok(())
    }

    async fn track_outcome(
        &self,
        theme: &str,
        outcome: Outcome,
        ctx: &MemoryContext,
    ) -> Result<(), MemoryError> {
        self.check_available()?;
        let delta = match outcome {
            Outcome::Positive => POSITIVE_WEIGHT,
            Outcome::Negative => NEGATIVE_WEIGHT,
        };
        let mut users = self.users.write().await;
        *users
            .entry(ctx.user_id.clone())
            .or_default()
            .theme_scores
            .entry(normalize_theme(theme))
            .or_insert(0.0) += delta;
        Ok(())
    }

    async fn theme_stats(
        &self,
        ctx: &MemoryContext,
        limit: usize,
    ) -> Result<Vec<ThemeStat>, MemoryError> {
        self.check_available()?;
        let users = self.users.read().await;
        let mut stats: Vec<ThemeStat> = users
            .get(&ctx.user_id)
            .map(|m| {
                m.theme_scores
                    .iter()
                    .map(|(theme, score)| ThemeStat {
                        theme: theme.clone(),
                        score: *score,
                    })
                    .collect()
            })
            .unwrap_or_default();
        stats.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.theme.cmp(&b.theme)));
        stats.truncate(limit);
        Ok(stats)
    }

    async fn track_preference_pair(
        &self,
        winner: &str,
        loser: &str,
        ctx: &MemoryContext,
    ) -> Result<(), MemoryError> {
        self.check_available()?;
        let mut users = self.users.write().await;
        users
            .entry(ctx.user_id.clone())
            .or_default()
            .preference_pairs
            .push((normalize_theme(winner), normalize_theme(loser)));
        Ok(())
    }
}

fn normalize_theme(theme: &str) -> String {
    theme.trim().to_lowercase()
}

fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(str::to_lowercase)
        .collect()
}
