//! Mock Reasoning Backend for testing.
//!
//! Provides a scripted implementation of the ReasoningBackend port so the
//! turn loop can be exercised without a real model.
//!
//! # Features
//!
//! - Pre-configured decisions, consumed in order
//! - Error injection for recovery testing
//! - Hangs for timeout testing
//! - Panics for containment testing
//! - Call tracking for verification
//!
//! # Example
//!
//! ```ignore
//! let backend = MockReasoningBackend::new()
//!     .with_error(ReasoningError::opaque("503 Service Unavailable"))
//!     .with_decision(decision);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::sleep;

use crate::domain::agent::{AgentAction, Decision};
use crate::domain::foundation::Confidence;
use crate::ports::{Observation, ReasoningBackend, ReasoningError};

/// A configured mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return this decision.
    Decision(Decision),
    /// Fail with this error.
    Error(ReasoningError),
    /// Sleep, then return the default decision.
    Hang(Duration),
    /// Panic with this message.
    Panic(String),
}

/// A recorded `think` call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub observation: Observation,
}

/// Mock reasoning backend.
#[derive(Debug, Clone, Default)]
pub struct MockReasoningBackend {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    delay: Duration,
}

impl MockReasoningBackend {
    /// Creates a backend that answers every call with the default decision.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a decision.
    pub fn with_decision(self, decision: Decision) -> Self {
        self.push(MockResponse::Decision(decision))
    }

    /// Queues an error.
    pub fn with_error(self, error: ReasoningError) -> Self {
        self.push(MockResponse::Error(error))
    }

    /// Queues a call that sleeps for `duration` before answering.
    pub fn with_hang(self, duration: Duration) -> Self {
        self.push(MockResponse::Hang(duration))
    }

    /// Queues a panic.
    pub fn with_panic(self, message: impl Into<String>) -> Self {
        self.push(MockResponse::Panic(message.into()))
    }

    /// Sets simulated latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn push(self, response: MockResponse) -> Self {
        lock(&self.responses).push_back(response);
        self
    }

    /// The decision returned once the queue is exhausted.
    pub fn default_decision() -> Decision {
        Decision::new(
            "Keep things calm and cozy.",
            AgentAction::SoothingTalk,
            Confidence::new(0.8).unwrap_or(Confidence::FULL),
        )
    }

    /// Returns the number of calls made.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Returns all recorded calls.
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    fn next_response(&self) -> Option<MockResponse> {
        lock(&self.responses).pop_front()
    }
}

#[async_trait]
impl ReasoningBackend for MockReasoningBackend {
    async fn think(
        &self,
        system_prompt: &str,
        observation: &Observation,
    ) -> Result<Decision, ReasoningError> {
        lock(&self.calls).push(RecordedCall {
            system_prompt: system_prompt.to_string(),
            observation: observation.clone(),
        });

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match self.next_response() {
            Some(MockResponse::Decision(decision)) => Ok(decision),
            Some(MockResponse::Error(error)) => Err(error),
            Some(MockResponse::Hang(duration)) => {
                sleep(duration).await;
                Ok(Self::default_decision())
            }
            Some(MockResponse::Panic(message)) => panic!("{}", message),
            None => Ok(Self::default_decision()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
