//! Turn loop configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::agent::{BackoffBounds, RecoveryEngine};

/// Turn loop and policy limits
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Reasoning attempts per turn
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Spend above which recovery aborts, in USD
    #[serde(default = "default_budget_ceiling")]
    pub budget_ceiling_usd: f64,

    #[serde(default = "default_backoff_floor")]
    pub backoff_floor_ms: u64,

    #[serde(default = "default_backoff_ceiling")]
    pub backoff_ceiling_ms: u64,

    /// Timeout for a single reasoning call
    #[serde(default = "default_reasoning_timeout")]
    pub reasoning_timeout_secs: u64,

    /// Rejections tolerated per session before service degrades
    #[serde(default = "default_max_interventions")]
    pub max_interventions: u64,

    /// Sleep cues below this confidence are ignored
    #[serde(default = "default_min_sleep_confidence")]
    pub min_sleep_confidence: f64,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl AgentConfig {
    pub fn reasoning_timeout(&self) -> Duration {
        Duration::from_secs(self.reasoning_timeout_secs)
    }

    pub fn backoff_bounds(&self) -> BackoffBounds {
        BackoffBounds {
            floor_ms: self.backoff_floor_ms,
            ceiling_ms: self.backoff_ceiling_ms,
        }
    }

    pub fn recovery_engine(&self) -> RecoveryEngine {
        RecoveryEngine::new(self.budget_ceiling_usd, self.max_attempts)
    }

    /// Validate turn loop configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::InvalidMaxAttempts);
        }
        if !self.budget_ceiling_usd.is_finite() || self.budget_ceiling_usd <= 0.0 {
            return Err(ValidationError::InvalidBudget);
        }
        if self.backoff_floor_ms > self.backoff_ceiling_ms {
            return Err(ValidationError::InvalidBackoffRange);
        }
        if self.reasoning_timeout_secs == 0 || self.reasoning_timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout);
        }
        if !(0.0..=1.0).contains(&self.min_sleep_confidence) {
            return Err(ValidationError::InvalidSleepConfidence);
        }
        if self.system_prompt.trim().is_empty() {
            return Err(ValidationError::MissingRequired("AGENT__SYSTEM_PROMPT"));
        }
        Ok(())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            budget_ceiling_usd: default_budget_ceiling(),
            backoff_floor_ms: default_backoff_floor(),
            backoff_ceiling_ms: default_backoff_ceiling(),
            reasoning_timeout_secs: default_reasoning_timeout(),
            max_interventions: default_max_interventions(),
            min_sleep_confidence: default_min_sleep_confidence(),
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_budget_ceiling() -> f64 {
    0.05
}

fn default_backoff_floor() -> u64 {
    50
}

fn default_backoff_ceiling() -> u64 {
    30_000
}

fn default_reasoning_timeout() -> u64 {
    30
}

fn default_max_interventions() -> u64 {
    5
}

fn default_min_sleep_confidence() -> f64 {
    0.6
}

fn default_system_prompt() -> String {
    concat!(
        "You are a gentle bedtime companion for a young child. ",
        "Weigh the goals RELAXATION, BONDING, EDUCATION and SAFETY, and keep energy low as bedtime nears. ",
        "Reply with a single JSON object with the fields goalsConsidered, conflictIdentified, ",
        "tradeOffMade, thought, action, confidence (0 to 1) and parameters ",
        "(energyLevel, durationMinutes, pacing, theme, script)."
    )
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_config_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.budget_ceiling_usd, 0.05);
        assert_eq!(config.backoff_floor_ms, 50);
        assert_eq!(config.backoff_ceiling_ms, 30_000);
        assert_eq!(config.max_interventions, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = AgentConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidMaxAttempts));
    }

    #[test]
    fn test_inverted_backoff_rejected() {
        let config = AgentConfig {
            backoff_floor_ms: 5_000,
            backoff_ceiling_ms: 100,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidBackoffRange));
    }

    #[test]
    fn test_sleep_confidence_range() {
        let config = AgentConfig {
            min_sleep_confidence: 1.5,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidSleepConfidence));
    }

    #[test]
    fn test_timeout_duration() {
        let config = AgentConfig {
            reasoning_timeout_secs: 10,
            ..Default::default()
        };
        assert_eq!(config.reasoning_timeout(), Duration::from_secs(10));
    }
}
