//! Recovery Engine - failure classification and correction planning.
//!
//! `assess` is pure: the same event always yields the same plan. Sleeping
//! for the returned backoff and tracking spend is the caller's job.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Category of a failed reasoning attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureType {
    ApiRateLimit,
    ApiAuthError,
    ApiServerError,
    ApiBadRequest,
    SchemaDrift,
    SafetyViolation,
    NetworkTimeout,
    QualityBreach,
    TokenLimit,
    Unknown,
}

impl FailureType {
    /// Order in which patterns are tried. More specific causes come first,
    /// so "content_filter returned 400" is a safety violation, not a bad
    /// request.
    const CLASSIFICATION_ORDER: [(FailureType, &'static [&'static str]); 9] = [
        (
            FailureType::SafetyViolation,
            &["safety", "content policy", "content_filter", "moderation"],
        ),
        (
            FailureType::TokenLimit,
            &["token limit", "context length", "maximum context", "too many tokens"],
        ),
        (
            FailureType::ApiRateLimit,
            &["429", "rate limit", "rate_limit", "too many requests", "quota"],
        ),
        (
            FailureType::ApiAuthError,
            &["401", "403", "unauthorized", "forbidden", "invalid api key", "authentication"],
        ),
        (
            FailureType::SchemaDrift,
            &["schema", "json", "parse", "missing field", "unexpected token"],
        ),
        (
            FailureType::NetworkTimeout,
            &["timeout", "timed out", "network", "connection reset", "econnreset"],
        ),
        (
            FailureType::ApiServerError,
            &["500", "502", "503", "504", "server error", "service unavailable", "bad gateway"],
        ),
        (FailureType::ApiBadRequest, &["400", "bad request", "invalid request"]),
        (FailureType::QualityBreach, &["quality", "intervention"]),
    ];

    /// Classifies free-form error text by case-insensitive substring match.
    pub fn classify(text: &str) -> FailureType {
        let lowered = text.to_lowercase();
        Self::CLASSIFICATION_ORDER
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|p| lowered.contains(p)))
            .map(|(failure_type, _)| *failure_type)
            .unwrap_or(FailureType::Unknown)
    }
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ApiRateLimit => "API_RATE_LIMIT",
            Self::ApiAuthError => "API_AUTH_ERROR",
            Self::ApiServerError => "API_SERVER_ERROR",
            Self::ApiBadRequest => "API_BAD_REQUEST",
            Self::SchemaDrift => "SCHEMA_DRIFT",
            Self::SafetyViolation => "SAFETY_VIOLATION",
            Self::NetworkTimeout => "NETWORK_TIMEOUT",
            Self::QualityBreach => "QUALITY_BREACH",
            Self::TokenLimit => "TOKEN_LIMIT",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// A failed attempt as seen by the recovery engine.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureEvent {
    pub failure_type: FailureType,
    /// Error text carried from the failing call.
    pub detail: String,
    /// Zero-based attempt number that failed.
    pub attempt: u32,
    pub cost_so_far_usd: f64,
}

impl FailureEvent {
    pub fn new(failure_type: FailureType, detail: impl Into<String>, attempt: u32, cost_so_far_usd: f64) -> Self {
        Self {
            failure_type,
            detail: detail.into(),
            attempt,
            cost_so_far_usd,
        }
    }
}

/// What to do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorrectionAction {
    Retry,
    SelfCorrect,
    Fallback,
    Abort,
    DegradeService,
}

impl CorrectionAction {
    /// True if the turn should call the backend again.
    pub fn retries(&self) -> bool {
        matches!(self, Self::Retry | Self::SelfCorrect)
    }
}

impl fmt::Display for CorrectionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Retry => "RETRY",
            Self::SelfCorrect => "SELF_CORRECT",
            Self::Fallback => "FALLBACK",
            Self::Abort => "ABORT",
            Self::DegradeService => "DEGRADE_SERVICE",
        };
        f.write_str(s)
    }
}

/// Extra plan parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionParameters {
    pub backoff_ms: u64,
}

/// The recovery strategy for one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionPlan {
    pub action: CorrectionAction,
    pub estimated_cost_usd: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<CorrectionParameters>,
}

impl CorrectionPlan {
    fn new(action: CorrectionAction, estimated_cost_usd: f64) -> Self {
        Self {
            action,
            estimated_cost_usd,
            parameters: None,
        }
    }

    fn with_backoff(mut self, backoff_ms: u64) -> Self {
        self.parameters = Some(CorrectionParameters { backoff_ms });
        self
    }

    /// Requested backoff; zero when the plan carries none.
    pub fn backoff_ms(&self) -> u64 {
        self.parameters.map(|p| p.backoff_ms).unwrap_or(0)
    }
}

/// Estimated spend of a cheap-model re-ask.
pub const SELF_CORRECT_COST_USD: f64 = 0.002;
/// Estimated spend of a full retry.
pub const RETRY_COST_USD: f64 = 0.01;

const LINEAR_BACKOFF_STEP_MS: u64 = 5_000;
const EXPONENTIAL_BACKOFF_BASE_MS: u64 = 1_000;

/// Failure classifier and correction planner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecoveryEngine {
    budget_ceiling_usd: f64,
    max_attempts: u32,
}

impl Default for RecoveryEngine {
    fn default() -> Self {
        Self::new(0.05, 3)
    }
}

impl RecoveryEngine {
    pub fn new(budget_ceiling_usd: f64, max_attempts: u32) -> Self {
        Self {
            budget_ceiling_usd,
            max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Chooses the correction for a failure.
    ///
    /// Checks, in order: reclassification of `UNKNOWN`, the budget circuit
    /// breaker, the attempt cap, then the per-type policy.
    pub fn assess(&self, event: &FailureEvent) -> CorrectionPlan {
        let failure_type = match event.failure_type {
            FailureType::Unknown => FailureType::classify(&event.detail),
            known => known,
        };

        if event.cost_so_far_usd > self.budget_ceiling_usd {
            return CorrectionPlan::new(CorrectionAction::Abort, 0.0);
        }

        if event.attempt >= self.max_attempts {
            return CorrectionPlan::new(CorrectionAction::Fallback, 0.0);
        }

        match failure_type {
            FailureType::SchemaDrift => {
                CorrectionPlan::new(CorrectionAction::SelfCorrect, SELF_CORRECT_COST_USD)
            }
            FailureType::NetworkTimeout | FailureType::ApiServerError => {
                CorrectionPlan::new(CorrectionAction::Retry, RETRY_COST_USD)
                    .with_backoff(linear_backoff_ms(event.attempt))
            }
            FailureType::ApiRateLimit => CorrectionPlan::new(CorrectionAction::Retry, RETRY_COST_USD)
                .with_backoff(exponential_backoff_ms(event.attempt)),
            FailureType::SafetyViolation | FailureType::ApiAuthError | FailureType::ApiBadRequest => {
                CorrectionPlan::new(CorrectionAction::Fallback, 0.0)
            }
            FailureType::TokenLimit => CorrectionPlan::new(CorrectionAction::Abort, 0.0),
            FailureType::QualityBreach => CorrectionPlan::new(CorrectionAction::DegradeService, 0.0),
            FailureType::Unknown => CorrectionPlan::new(CorrectionAction::Fallback, 0.0),
        }
    }
}

fn linear_backoff_ms(attempt: u32) -> u64 {
    LINEAR_BACKOFF_STEP_MS.saturating_mul(u64::from(attempt) + 1)
}

fn exponential_backoff_ms(attempt: u32) -> u64 {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    EXPONENTIAL_BACKOFF_BASE_MS.saturating_mul(factor)
}

/// Bounds applied to a plan's backoff before sleeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffBounds {
    pub floor_ms: u64,
    pub ceiling_ms: u64,
}

impl Default for BackoffBounds {
    fn default() -> Self {
        Self {
            floor_ms: 50,
            ceiling_ms: 30_000,
        }
    }
}

impl BackoffBounds {
    /// Clamps a requested backoff into `[floor, ceiling]`.
    pub fn clamp(&self, requested_ms: u64) -> Duration {
        let ceiling = self.ceiling_ms.max(self.floor_ms);
        Duration::from_millis(requested_ms.clamp(self.floor_ms, ceiling))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> RecoveryEngine {
        RecoveryEngine::default()
    }

    fn assess(failure_type: FailureType, attempt: u32, cost: f64) -> CorrectionPlan {
        engine().assess(&FailureEvent::new(failure_type, "", attempt, cost))
    }

    mod classification {
        use super::*;

        #[test]
        fn rate_limit_text() {
            assert_eq!(FailureType::classify("HTTP 429 Too Many Requests"), FailureType::ApiRateLimit);
        }

        #[test]
        fn auth_text() {
            assert_eq!(FailureType::classify("Invalid API key provided"), FailureType::ApiAuthError);
        }

        #[test]
        fn server_text() {
            assert_eq!(FailureType::classify("503 Service Unavailable"), FailureType::ApiServerError);
        }

        #[test]
        fn schema_text() {
            assert_eq!(FailureType::classify("missing field `thought`"), FailureType::SchemaDrift);
        }

        #[test]
        fn safety_wins_over_bad_request() {
            assert_eq!(
                FailureType::classify("400: content_filter triggered"),
                FailureType::SafetyViolation
            );
        }

        #[test]
        fn token_limit_text() {
            assert_eq!(
                FailureType::classify("This model's maximum context length is 8192"),
                FailureType::TokenLimit
            );
        }

        #[test]
        fn timeout_text() {
            assert_eq!(FailureType::classify("request timed out"), FailureType::NetworkTimeout);
        }

        #[test]
        fn unmatched_text_stays_unknown() {
            assert_eq!(FailureType::classify("the cat sat on the keyboard"), FailureType::Unknown);
        }

        #[test]
        fn unknown_events_are_reclassified_before_policy() {
            let plan = engine().assess(&FailureEvent::new(FailureType::Unknown, "rate limit hit", 0, 0.0));
            assert_eq!(plan.action, CorrectionAction::Retry);
            assert_eq!(plan.backoff_ms(), 1_000);
        }
    }

    mod policy {
        use super::*;

        #[test]
        fn schema_drift_self_corrects() {
            let plan = assess(FailureType::SchemaDrift, 0, 0.0);
            assert_eq!(plan.action, CorrectionAction::SelfCorrect);
            assert!(plan.estimated_cost_usd > 0.0);
        }

        #[test]
        fn timeouts_back_off_linearly() {
            assert_eq!(assess(FailureType::NetworkTimeout, 0, 0.0).backoff_ms(), 5_000);
            assert_eq!(assess(FailureType::ApiServerError, 2, 0.0).backoff_ms(), 15_000);
        }

        #[test]
        fn rate_limits_back_off_exponentially() {
            assert_eq!(assess(FailureType::ApiRateLimit, 0, 0.0).backoff_ms(), 1_000);
            assert_eq!(assess(FailureType::ApiRateLimit, 1, 0.0).backoff_ms(), 2_000);
            assert_eq!(assess(FailureType::ApiRateLimit, 2, 0.0).backoff_ms(), 4_000);
        }

        #[test]
        fn non_retriable_failures_fall_back() {
            for ft in [FailureType::SafetyViolation, FailureType::ApiAuthError, FailureType::ApiBadRequest] {
                assert_eq!(assess(ft, 0, 0.0).action, CorrectionAction::Fallback);
            }
        }

        #[test]
        fn token_limit_aborts() {
            assert_eq!(assess(FailureType::TokenLimit, 0, 0.0).action, CorrectionAction::Abort);
        }

        #[test]
        fn quality_breach_degrades() {
            assert_eq!(assess(FailureType::QualityBreach, 0, 0.0).action, CorrectionAction::DegradeService);
        }

        #[test]
        fn unknown_falls_back() {
            assert_eq!(assess(FailureType::Unknown, 0, 0.0).action, CorrectionAction::Fallback);
        }

        #[test]
        fn budget_exactly_at_ceiling_is_allowed() {
            assert_eq!(assess(FailureType::SchemaDrift, 0, 0.05).action, CorrectionAction::SelfCorrect);
        }

        #[test]
        fn huge_attempt_does_not_overflow_backoff() {
            let engine = RecoveryEngine::new(0.05, u32::MAX);
            let plan = engine.assess(&FailureEvent::new(FailureType::ApiRateLimit, "", 80, 0.0));
            assert_eq!(plan.backoff_ms(), u64::MAX);
        }
    }

    mod backoff_bounds {
        use super::*;

        #[test]
        fn clamps_into_range() {
            let bounds = BackoffBounds::default();
            assert_eq!(bounds.clamp(0), Duration::from_millis(50));
            assert_eq!(bounds.clamp(5_000), Duration::from_millis(5_000));
            assert_eq!(bounds.clamp(u64::MAX), Duration::from_millis(30_000));
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn any_failure_type() -> impl Strategy<Value = FailureType> {
            proptest::sample::select(vec![
                FailureType::ApiRateLimit,
                FailureType::ApiAuthError,
                FailureType::ApiServerError,
                FailureType::ApiBadRequest,
                FailureType::SchemaDrift,
                FailureType::SafetyViolation,
                FailureType::NetworkTimeout,
                FailureType::QualityBreach,
                FailureType::TokenLimit,
                FailureType::Unknown,
            ])
        }

        proptest! {
            #[test]
            fn over_budget_always_aborts(
                ft in any_failure_type(),
                detail in ".{0,40}",
                attempt in 0u32..10,
                cost in 0.050_000_1f64..100.0,
            ) {
                let plan = engine().assess(&FailureEvent::new(ft, detail, attempt, cost));
                prop_assert_eq!(plan.action, CorrectionAction::Abort);
            }

            #[test]
            fn attempt_cap_always_falls_back(
                ft in any_failure_type(),
                detail in ".{0,40}",
                attempt in 3u32..1000,
                cost in 0.0f64..=0.05,
            ) {
                let plan = engine().assess(&FailureEvent::new(ft, detail, attempt, cost));
                prop_assert_eq!(plan.action, CorrectionAction::Fallback);
            }

            #[test]
            fn clamped_backoff_stays_in_bounds(requested in any::<u64>()) {
                let d = BackoffBounds::default().clamp(requested);
                prop_assert!(d >= Duration::from_millis(50));
                prop_assert!(d <= Duration::from_millis(30_000));
            }
        }
    }
}
