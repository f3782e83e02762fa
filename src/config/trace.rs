//! Trace sink configuration

use serde::Deserialize;
use std::path::PathBuf;

/// Where reasoning traces go
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TraceConfig {
    /// JSON-lines file; traces are kept in memory when unset
    pub path: Option<PathBuf>,
}
