//! Snapshot file access.
//!
//! The file holds the whole store as a JSON array of wire metrics and is
//! rewritten in full on every dump.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::StoreError;
use crate::models::{validate, Metric, WireMetric};
use crate::retry::{RetryError, RetryPolicy};

#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>, cancel: CancellationToken) -> Self {
        Self {
            path: path.into(),
            retry: RetryPolicy::default(),
            cancel,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every metric from the file.
    ///
    /// A missing or empty file is an empty snapshot; content that does not
    /// parse is [`StoreError::MalformedSnapshot`].
    pub async fn read_all(&self) -> Result<Vec<Metric>, StoreError> {
        let mut file = match self.open(OpenOptions::new().read(true)).await {
            Ok(file) => file,
            Err(StoreError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No snapshot file, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut content = Vec::new();
        file.read_to_end(&mut content).await?;
        decode(&content)
    }

    /// Replace the file content with `metrics`
    pub async fn write_all(&self, metrics: &[Metric]) -> Result<(), StoreError> {
        let wire: Vec<WireMetric> = metrics.iter().map(WireMetric::from).collect();
        let content = serde_json::to_vec(&wire)
            .map_err(|e| StoreError::MalformedSnapshot(format!("failed to encode snapshot: {}", e)))?;

        let mut file = self
            .open(OpenOptions::new().write(true).create(true).truncate(true))
            .await?;
        file.write_all(&content).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }

    async fn open(&self, options: &OpenOptions) -> Result<File, StoreError> {
        let result = self
            .retry
            .run(&self.cancel, is_transient_open_error, move |_| options.open(&self.path))
            .await;

        match result {
            Ok(file) => Ok(file),
            Err(RetryError::Permanent(e)) => Err(StoreError::Io(e)),
            Err(RetryError::Exhausted { attempts, last }) => Err(StoreError::RetriesExhausted {
                attempts,
                last: format!("{}: {}", self.path.display(), last),
            }),
            Err(RetryError::Cancelled { .. }) => Err(StoreError::Cancelled),
        }
    }
}

/// Open failures that may clear up on their own (locks, interrupted calls,
/// exhausted descriptors). A missing file or directory is never retried.
fn is_transient_open_error(error: &std::io::Error) -> bool {
    !matches!(
        error.kind(),
        ErrorKind::NotFound | ErrorKind::InvalidInput | ErrorKind::AlreadyExists | ErrorKind::Unsupported
    )
}

fn decode(content: &[u8]) -> Result<Vec<Metric>, StoreError> {
    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let wire: Vec<WireMetric> =
        serde_json::from_slice(content).map_err(|e| StoreError::MalformedSnapshot(e.to_string()))?;
    wire.into_iter()
        .map(|m| validate(m).map_err(StoreError::from))
        .collect()
}
