//! Error types shared by the pipeline stages.
//!
//! Only conditions that stop a stage are errors. Unresolvable references and
//! malformed time slots are folded into "check skipped" by the validator, a
//! failed proposal is counted in its stage report, and an exhausted fixer
//! budget is a controller state rather than a failure.

use std::path::PathBuf;

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error type for pipeline operations
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Missing static data: {0}")]
    MissingStaticData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl PipelineError {
    /// Wrap an I/O error together with the path that caused it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}
