//! File-based Trace Sink Adapter
//!
//! Appends each trace as one JSON line. Writes are serialized through a
//! mutex so concurrent turns never interleave partial lines.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::domain::agent::ReasoningTrace;
use crate::ports::{TraceSink, TraceSinkError};

/// JSON-lines trace file
#[derive(Debug)]
pub struct FileTraceSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTraceSink {
    /// Create a sink appending to `path`
    ///
    /// # Example
    /// ```ignore
    /// let sink = FileTraceSink::new("./data/traces.jsonl");
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TraceSink for FileTraceSink {
    async fn save(&self, trace: &ReasoningTrace) -> Result<(), TraceSinkError> {
        let mut line = serde_json::to_string(trace)
            .map_err(|e| TraceSinkError::Serialization(e.to_string()))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| TraceSinkError::Io(e.to_string()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| TraceSinkError::Io(e.to_string()))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| TraceSinkError::Io(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| TraceSinkError::Io(e.to_string()))
    }
}
