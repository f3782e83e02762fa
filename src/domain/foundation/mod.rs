//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers and error types that form the
//! vocabulary of the bedtime agent domain.

mod confidence;
mod errors;
mod ids;
mod percentage;
mod state_machine;
mod timestamp;

pub use confidence::Confidence;
pub use errors::ValidationError;
pub use ids::{SessionId, TraceId, UserId};
pub use percentage::Percentage;
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
