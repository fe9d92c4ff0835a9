//! Error types for the ingestion pipeline.

use pixsync_core::Stage;
use pixsync_db::DbError;
use pixsync_storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Errors that can occur during ingestion.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Invalid channel: {0}")]
    InvalidChannel(String),

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    /// Blob store unreachable or failing; the source file stays for the next cycle.
    #[error("Store error while {stage}: {source}")]
    TransientStore {
        stage: Stage,
        #[source]
        source: StorageError,
    },

    /// The blob is stored but the index write failed.
    #[error("Stored {key} but indexing failed: {source}")]
    PartialWrite {
        key: String,
        #[source]
        source: DbError,
    },

    /// The record is durable; only removing the local file failed.
    #[error("Cleanup of {path} failed: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Transform error: {0}")]
    Transform(String),
}

impl IngestError {
    /// Whether the file should be picked up again on the next scan.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IngestError::TransientStore { .. }
                | IngestError::PartialWrite { .. }
                | IngestError::Cleanup { .. }
                | IngestError::Io(_)
        )
    }

    /// Last stage the file reached before failing.
    pub fn stage(&self) -> Stage {
        match self {
            IngestError::TransientStore { stage, .. } => *stage,
            IngestError::PartialWrite { .. } => Stage::Uploaded,
            IngestError::Cleanup { .. } => Stage::Notified,
            _ => Stage::Discovered,
        }
    }
}

impl From<notify::Error> for IngestError {
    fn from(err: notify::Error) -> Self {
        IngestError::Watch(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        let partial = IngestError::PartialWrite {
            key: "Original/a.png".to_string(),
            source: DbError::Other("down".to_string()),
        };
        assert!(partial.is_retryable());
        assert_eq!(partial.stage(), Stage::Uploaded);

        let invalid = IngestError::InvalidChannel("Gallery".to_string());
        assert!(!invalid.is_retryable());
        assert_eq!(invalid.stage(), Stage::Discovered);
    }
}
