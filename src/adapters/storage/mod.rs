//! Storage Adapters
//!
//! Implementations of the SessionStore port.
//!
//! ## Available Adapters
//!
//! - **InMemorySessionStore** - Process-local map (testing/development)
//! - **RedisSessionStore** - Networked store with CAS commits and TTL expiry
//!
//! ## Usage
//!
//! ```ignore
//! use adapters::storage::{InMemorySessionStore, RedisSessionStore};
//!
//! // Production: shared across processes
//! let store = RedisSessionStore::connect(&config.storage.redis).await?;
//!
//! // Testing: in-memory storage
//! let store = InMemorySessionStore::new();
//! ```

mod in_memory_session_store;
mod redis_session_store;

pub use in_memory_session_store::InMemorySessionStore;
pub use redis_session_store::RedisSessionStore;
