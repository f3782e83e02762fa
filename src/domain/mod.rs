//! Domain layer containing the agent's types and pure rules.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (identifiers, timestamps, value objects, errors)
//! - `session` - Per-session conversation record, goal stack and snapshot history
//! - `agent` - Phase machine, decisions, arbitration, recovery and feedback policy

pub mod agent;
pub mod foundation;
pub mod session;
