//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the orchestrator and the outside world. Adapters implement these ports.
//!
//! - `SessionStore` - Versioned, rollback-capable session state
//! - `ReasoningBackend` - The nondeterministic decision source
//! - `MemoryPort` - Long-term memory and theme learning
//! - `TraceSink` - Reasoning trace destination

mod memory;
mod reasoning_backend;
mod session_store;
mod trace_sink;

pub use memory::{MemoryContext, MemoryError, MemoryPort, MemoryRecord, MemoryType, Outcome, ThemeStat};
pub use reasoning_backend::{Observation, ReasoningBackend, ReasoningError};
pub use session_store::{SessionStore, SessionStoreError};
pub use trace_sink::{TraceSink, TraceSinkError};
