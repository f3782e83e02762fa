//! Reasoning Backend Adapters.
//!
//! ## Available Adapters
//!
//! - `MockReasoningBackend` - Scripted decisions, errors, hangs and panics for testing
//! - `OpenAiReasoningBackend` - OpenAI-compatible chat completions in JSON mode

mod mock_backend;
mod openai_backend;

pub use mock_backend::{MockReasoningBackend, MockResponse, RecordedCall};
pub use openai_backend::OpenAiReasoningBackend;
