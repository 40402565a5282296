//! Pipeline error types.
//!
//! Only input validation and output persistence surface as errors; failures
//! inside a chunk are reported through its `ChunkAnalysis` instead.

use std::path::PathBuf;

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Input file '{}' not found", .0.display())]
    InputNotFound(PathBuf),

    #[error(
        "Input file '{}' is inside the work directory under a temporary file name and would be overwritten",
        .0.display()
    )]
    InputConflict(PathBuf),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to write timeline to {}: {source}", .path.display())]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether the run was rejected before any work started.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            PipelineError::InputNotFound(_) | PipelineError::InputConflict(_) | PipelineError::ConfigError(_)
        )
    }
}
