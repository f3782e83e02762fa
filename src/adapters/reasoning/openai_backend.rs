//! OpenAI Reasoning Backend - chat completions in JSON mode.
//!
//! Works with any OpenAI-compatible endpoint. The model is asked for a
//! single JSON object which is parsed straight into a `Decision`.
//!
//! # Error mapping
//!
//! HTTP failures become `ReasoningError`s hinted with the failure type the
//! status implies, so recovery does not depend on error wording. Output
//! that is not a valid decision is hinted as `SCHEMA_DRIFT`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ReasoningConfig;
use crate::domain::agent::{Decision, FailureType};
use crate::ports::{Observation, ReasoningBackend, ReasoningError};

/// OpenAI-compatible reasoning backend.
pub struct OpenAiReasoningBackend {
    client: Client,
    api_key: Secret<String>,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OpenAiReasoningBackend {
    /// Creates a backend from configuration.
    ///
    /// # Errors
    /// Fails if no API key is configured or the HTTP client cannot be built.
    pub fn new(config: &ReasoningConfig) -> Result<Self, ReasoningError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|_| config.has_api_key())
            .ok_or_else(|| {
                ReasoningError::classified(FailureType::ApiAuthError, "No reasoning API key configured")
            })?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ReasoningError::opaque(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn to_request(&self, system_prompt: &str, observation: &Observation) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: observation.to_prompt(),
                },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
        }
    }
}

#[async_trait]
impl ReasoningBackend for OpenAiReasoningBackend {
    async fn think(
        &self,
        system_prompt: &str,
        observation: &Observation,
    ) -> Result<Decision, ReasoningError> {
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.to_request(system_prompt, observation))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            ReasoningError::classified(FailureType::SchemaDrift, format!("Unreadable completion: {}", e))
        })?;
        let choice = body.choices.into_iter().next().ok_or_else(|| {
            ReasoningError::classified(FailureType::SchemaDrift, "No choices in completion")
        })?;

        match choice.finish_reason.as_deref() {
            Some("content_filter") => {
                return Err(ReasoningError::classified(
                    FailureType::SafetyViolation,
                    "Completion stopped by content filter",
                ))
            }
            Some("length") => {
                return Err(ReasoningError::classified(
                    FailureType::TokenLimit,
                    "Completion hit the token limit",
                ))
            }
            _ => {}
        }

        debug!(model = %self.model, "Reasoning completion received");
        parse_decision(choice.message.content.as_deref().unwrap_or_default())
    }
}

impl std::fmt::Debug for OpenAiReasoningBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiReasoningBackend")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Parses model output into a decision.
pub(crate) fn parse_decision(content: &str) -> Result<Decision, ReasoningError> {
    serde_json::from_str(content.trim()).map_err(|e| {
        ReasoningError::classified(FailureType::SchemaDrift, format!("Decision JSON parse failed: {}", e))
    })
}

/// Maps a non-success status to a hinted error.
pub(crate) fn status_error(status: StatusCode, body: &str) -> ReasoningError {
    let hint = match status.as_u16() {
        401 | 403 => FailureType::ApiAuthError,
        429 => FailureType::ApiRateLimit,
        408 | 504 => FailureType::NetworkTimeout,
        400 if body.contains("context_length_exceeded") || body.contains("maximum context length") => {
            FailureType::TokenLimit
        }
        400 if body.contains("content_filter") || body.contains("content_policy") => {
            FailureType::SafetyViolation
        }
        400 | 404 | 422 => FailureType::ApiBadRequest,
        500..=599 => FailureType::ApiServerError,
        _ => return ReasoningError::opaque(format!("Unexpected status {}: {}", status, body)),
    };
    ReasoningError::classified(hint, format!("HTTP {}: {}", status, body))
}

fn transport_error(err: reqwest::Error) -> ReasoningError {
    if err.is_timeout() {
        ReasoningError::classified(FailureType::NetworkTimeout, format!("Request timed out: {}", err))
    } else {
        ReasoningError::classified(FailureType::NetworkTimeout, format!("Network error: {}", err))
    }
}

// ----------------------------------------------------------------------------
// Wire types
// ----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}
