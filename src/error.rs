//! Error types for backup export.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Step of an atomic write that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteStage {
    CreateDir,
    CreateTemp,
    Write,
    Sync,
    Persist,
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WriteStage::CreateDir => "create directory",
            WriteStage::CreateTemp => "create temp file",
            WriteStage::Write => "write temp file",
            WriteStage::Sync => "sync temp file",
            WriteStage::Persist => "rename temp file",
        };
        f.write_str(s)
    }
}

/// Main error type for backup operations.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to {stage} for {}: {source}", .path.display())]
    AtomicWrite {
        path: PathBuf,
        stage: WriteStage,
        #[source]
        source: std::io::Error,
    },

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Scan failed: {0}")]
    Scan(String),

    #[error("Column not found in result set: {column}")]
    MissingColumn { column: String },

    #[error("Shadow rows have {shadow} columns, primary has {primary}")]
    ColumnMismatch { primary: usize, shadow: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Export cancelled")]
    Cancelled,

    #[error("backup {entity}: {source}")]
    Entity {
        entity: &'static str,
        #[source]
        source: Box<BackupError>,
    },
}

impl BackupError {
    /// Attach the entity name to an error raised while exporting it.
    pub fn in_entity(self, entity: &'static str) -> Self {
        BackupError::Entity {
            entity,
            source: Box::new(self),
        }
    }

    /// Whether this error (or the error it wraps) is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            BackupError::Cancelled => true,
            BackupError::Entity { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for BackupError {
    fn from(e: serde_json::Error) -> Self {
        BackupError::Serialization(e.to_string())
    }
}

/// Result type for backup operations.
pub type Result<T> = std::result::Result<T, BackupError>;
