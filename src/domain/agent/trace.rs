//! Reasoning traces - one transparency record per turn.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{SessionId, Timestamp, TraceId, UserId};

use super::decision::Decision;
use super::recovery::{CorrectionAction, FailureType};

/// What the resilience layer did during the turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResilienceMeta {
    /// Most recent failure seen during the turn.
    pub failure_encountered: Option<FailureType>,
    /// Last correction applied.
    pub correction_attempted: Option<CorrectionAction>,
    pub recovery_cost_usd: f64,
    pub attempts: u32,
}

/// Append-only record of the decision taken on a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningTrace {
    pub trace_id: TraceId,
    pub session_id: SessionId,
    pub user_id: UserId,
    pub decision: Decision,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resilience_meta: Option<ResilienceMeta>,
}

impl ReasoningTrace {
    pub fn new(session_id: SessionId, user_id: UserId, decision: Decision) -> Self {
        Self {
            trace_id: TraceId::new(),
            session_id,
            user_id,
            decision,
            timestamp: Timestamp::now(),
            resilience_meta: None,
        }
    }

    pub fn with_resilience(mut self, meta: ResilienceMeta) -> Self {
        self.resilience_meta = Some(meta);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::AgentAction;

    #[test]
    fn trace_omits_resilience_when_clean() {
        let trace = ReasoningTrace::new(
            SessionId::new("s").unwrap(),
            UserId::new("u").unwrap(),
            Decision::safe_mode(),
        );
        let json = serde_json::to_value(&trace).unwrap();
        assert!(json.get("resilienceMeta").is_none());
        assert_eq!(json["decision"]["action"], AgentAction::SoothingTalk.as_str());
    }

    #[test]
    fn trace_serializes_resilience_meta() {
        let trace = ReasoningTrace::new(
            SessionId::new("s").unwrap(),
            UserId::new("u").unwrap(),
            Decision::fallback(),
        )
        .with_resilience(ResilienceMeta {
            failure_encountered: Some(FailureType::NetworkTimeout),
            correction_attempted: Some(CorrectionAction::Fallback),
            recovery_cost_usd: 0.02,
            attempts: 3,
        });
        let json = serde_json::to_value(&trace).unwrap();
        assert_eq!(json["resilienceMeta"]["failureEncountered"], "NETWORK_TIMEOUT");
        assert_eq!(json["resilienceMeta"]["correctionAttempted"], "FALLBACK");
    }
}
