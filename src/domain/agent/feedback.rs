//! Explicit feedback detection on user utterances.
//!
//! Keyword matching is policy, not contract: the word lists are configurable
//! and default to a small set of common phrasings.

/// What the child said about the last suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackSignal {
    Accepted,
    Rejected,
}

/// Whole-word phrase matcher for acceptance and rejection.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackPolicy {
    rejection_patterns: Vec<String>,
    acceptance_patterns: Vec<String>,
}

pub const DEFAULT_REJECTION_PATTERNS: &[&str] = &[
    "no",
    "nope",
    "don't like",
    "do not like",
    "don't want",
    "boring",
    "scary",
    "something else",
    "not that",
    "another one",
];

pub const DEFAULT_ACCEPTANCE_PATTERNS: &[&str] = &[
    "yes",
    "yeah",
    "yay",
    "ok",
    "okay",
    "sure",
    "sounds good",
    "i like",
    "love it",
    "let's do it",
];

impl Default for FeedbackPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_REJECTION_PATTERNS.iter().map(|s| s.to_string()),
            DEFAULT_ACCEPTANCE_PATTERNS.iter().map(|s| s.to_string()),
        )
    }
}

impl FeedbackPolicy {
    pub fn new(
        rejection_patterns: impl IntoIterator<Item = String>,
        acceptance_patterns: impl IntoIterator<Item = String>,
    ) -> Self {
        let prepare = |patterns: Vec<String>| -> Vec<String> {
            patterns
                .into_iter()
                .map(|p| normalize(&p))
                .filter(|p| !p.trim().is_empty())
                .collect()
        };
        Self {
            rejection_patterns: prepare(rejection_patterns.into_iter().collect()),
            acceptance_patterns: prepare(acceptance_patterns.into_iter().collect()),
        }
    }

    /// Detects feedback in a message. Rejection wins when both match.
    pub fn detect(&self, message: &str) -> Option<FeedbackSignal> {
        let text = normalize(message);
        if Self::matches_any(&text, &self.rejection_patterns) {
            Some(FeedbackSignal::Rejected)
        } else if Self::matches_any(&text, &self.acceptance_patterns) {
            Some(FeedbackSignal::Accepted)
        } else {
            None
        }
    }

    fn matches_any(text: &str, patterns: &[String]) -> bool {
        patterns.iter().any(|p| text.contains(p.as_str()))
    }
}

/// Lowercases, replaces punctuation with spaces, collapses whitespace and pads
/// with one space on each side, so `contains` only hits whole words.
fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
        .collect();
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    format!(" {} ", words.join(" "))
}
