//! Adapters - Implementations of the ports for concrete technologies.
//!
//! - `storage` - Session stores (in-memory, Redis)
//! - `reasoning` - Reasoning backends (mock, OpenAI-compatible)
//! - `memory` - Memory service (in-memory)
//! - `trace` - Trace sinks (in-memory, JSON-lines file)

pub mod memory;
pub mod reasoning;
pub mod storage;
pub mod trace;
