//! Trace Sink Adapters
//!
//! - **InMemoryTraceSink** - Records traces for inspection (testing/development)
//! - **FileTraceSink** - Appends traces to a JSON-lines file

mod file_trace_sink;
mod in_memory_trace_sink;

pub use file_trace_sink::FileTraceSink;
pub use in_memory_trace_sink::InMemoryTraceSink;
