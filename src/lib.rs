//! Bedtime Agent - resilient orchestration core for a bedtime storytelling agent
//!
//! Wraps an unreliable reasoning backend with a deterministic phase machine,
//! policy arbitration, failure recovery and a rollback-capable session store.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
