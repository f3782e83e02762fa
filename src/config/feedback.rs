//! Feedback keyword configuration

use serde::Deserialize;

use crate::domain::agent::{FeedbackPolicy, DEFAULT_ACCEPTANCE_PATTERNS, DEFAULT_REJECTION_PATTERNS};

/// Phrases that count as accepting or rejecting a suggestion
///
/// Lists may be given as comma-separated strings in the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackConfig {
    #[serde(default = "default_rejection_patterns")]
    pub rejection_patterns: String,

    #[serde(default = "default_acceptance_patterns")]
    pub acceptance_patterns: String,
}

impl FeedbackConfig {
    pub fn policy(&self) -> FeedbackPolicy {
        FeedbackPolicy::new(split(&self.rejection_patterns), split(&self.acceptance_patterns))
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            rejection_patterns: default_rejection_patterns(),
            acceptance_patterns: default_acceptance_patterns(),
        }
    }
}

fn split(list: &str) -> Vec<String> {
    list.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

fn default_rejection_patterns() -> String {
    DEFAULT_REJECTION_PATTERNS.join(",")
}

fn default_acceptance_patterns() -> String {
    DEFAULT_ACCEPTANCE_PATTERNS.join(",")
}
