//! Error types for the itemcat pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Dataset not found: {}", path.display())]
    DatasetNotFound { path: PathBuf },

    #[error(
        "Malformed dataset row at {}:{line}: expected {expected} fields, found {found}",
        path.display()
    )]
    DatasetFormat {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("Invalid pipeline spec: {0}")]
    InvalidSpec(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Model artifact is corrupt: {0}")]
    ArtifactCorrupt(String),

    #[error("Model artifact has version {found}, newest supported is {supported}")]
    ArtifactVersion { found: u32, supported: u32 },

    #[error("Training error: {0}")]
    Training(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}
