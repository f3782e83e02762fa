//! Memory Adapters
//!
//! - **InMemoryMemoryStore** - Process-local theme scores, preference pairs and memories

mod in_memory_memory_store;

pub use in_memory_memory_store::InMemoryMemoryStore;
