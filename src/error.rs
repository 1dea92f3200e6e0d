//! Error types for the exemplar retrieval system
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages.

use std::path::PathBuf;
use thiserror::Error;

use crate::vector::VectorError;

/// Main error type for store, build and search operations
#[derive(Error, Debug)]
pub enum ExemplarError {
    /// A persisted artifact is missing
    #[error("Artifact not found at '{path}'. Has the store been built?")]
    NotFound { path: PathBuf },

    /// Operation requires state that has not been loaded or created
    #[error("Invalid state: {reason}")]
    InvalidState { reason: String },

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Persisted state exists but cannot be trusted
    #[error("Persisted state at '{path}' is corrupted: {reason}")]
    CorruptState { path: PathBuf, reason: String },

    #[error("Embedding provider failed: {0}")]
    EmbeddingFailure(String),

    /// File system errors while reading or writing artifacts
    #[error("Failed to persist '{path}': {source}")]
    Persistence {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read corpus '{path}' at line {line}: {reason}")]
    CorpusParse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

impl ExemplarError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::CorruptState { .. } => "CORRUPT_STATE",
            Self::EmbeddingFailure(_) => "EMBEDDING_FAILURE",
            Self::Persistence { .. } => "PERSISTENCE_ERROR",
            Self::CorpusParse { .. } => "CORPUS_PARSE_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::NotFound { .. } => vec![
                "Run 'exemplar build <corpus.jsonl>' to create the store",
                "Check that data_dir in .exemplar/settings.toml points at the right directory",
            ],
            Self::InvalidState { .. } => vec!["Load or build the store before searching"],
            Self::DimensionMismatch { .. } => vec![
                "The store was built with a different embedding model",
                "Run 'exemplar build --full' to rebuild with the current model",
            ],
            Self::CorruptState { .. } => vec![
                "Run 'exemplar build --full' to rebuild from the corpus",
                "Check for disk errors or concurrent writers",
            ],
            Self::EmbeddingFailure(_) => vec![
                "Check that the model is cached, or disable offline mode to download it",
                "Verify the configured model name with 'exemplar config'",
            ],
            Self::Persistence { .. } => vec![
                "Check disk space and permissions in the data directory",
                "The previously committed store is still readable",
            ],
            Self::CorpusParse { .. } => {
                vec!["Each corpus line must be one JSON object matching the record schema"]
            }
            Self::Config { .. } => vec!["Run 'exemplar init --force' to regenerate settings"],
        }
    }

    /// Attach a path to a vector-layer error.
    pub fn from_vector(error: VectorError, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match error {
            VectorError::NotFound(_) => Self::NotFound { path },
            VectorError::NotInitialized => Self::InvalidState {
                reason: "index is not initialized".to_string(),
            },
            VectorError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            VectorError::InvalidDimension { dimension, reason } => Self::CorruptState {
                path,
                reason: format!("invalid dimension {dimension}: {reason}"),
            },
            VectorError::InvalidFormat(reason) => Self::CorruptState { path, reason },
            VectorError::VersionMismatch { expected, actual } => Self::CorruptState {
                path,
                reason: format!("unsupported index version {actual}, expected {expected}"),
            },
            VectorError::Storage(source) => Self::Persistence { path, source },
            VectorError::EmbeddingFailed(message) => Self::EmbeddingFailure(message),
        }
    }
}

impl From<VectorError> for ExemplarError {
    fn from(error: VectorError) -> Self {
        match error {
            VectorError::NotInitialized => Self::InvalidState {
                reason: "index is not initialized".to_string(),
            },
            VectorError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            VectorError::EmbeddingFailed(message) => Self::EmbeddingFailure(message),
            other => Self::from_vector(other, PathBuf::new()),
        }
    }
}

/// Result type alias for store operations
pub type ExemplarResult<T> = Result<T, ExemplarError>;

/// Helper trait for attaching a path to I/O errors
pub trait ErrorContext<T> {
    fn with_path(self, path: &std::path::Path) -> ExemplarResult<T>;
}

impl<T> ErrorContext<T> for Result<T, std::io::Error> {
    fn with_path(self, path: &std::path::Path) -> ExemplarResult<T> {
        self.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ExemplarError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ExemplarError::Persistence {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })
    }
}
