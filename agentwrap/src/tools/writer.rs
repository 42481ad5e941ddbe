//! Append-only JSON Lines output.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

pub const DEFAULT_OUTPUT_PATH: &str = "results.txt";

/// Outcome of a write, serialized as `{"written_count": n}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum WriteSummary {
    Written { written_count: usize },
    Failed { error: String },
}

/// Appends one compact JSON object per line to a file.
#[derive(Debug, Clone)]
pub struct JsonlWriter {
    path: PathBuf,
}

impl Default for JsonlWriter {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_PATH)
    }
}

impl JsonlWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `records`, creating the file if needed. Never fails; errors are
    /// reported in the summary.
    pub async fn write<T: Serialize>(&self, records: &[T]) -> WriteSummary {
        match self.append(records).await {
            Ok(written_count) => WriteSummary::Written { written_count },
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "writing records failed");
                WriteSummary::Failed {
                    error: err.to_string(),
                }
            }
        }
    }

    async fn append<T: Serialize>(&self, records: &[T]) -> crate::errors::AgentResult<usize> {
        let mut buffer = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&buffer).await?;
        file.flush().await?;
        Ok(records.len())
    }
}
