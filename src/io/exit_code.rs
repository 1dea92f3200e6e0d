//! Exit codes for CLI operations following Unix conventions.
//!
//! # Exit Code Semantics
//!
//! - `0`: Success, including searches that return no hits
//! - `1`: General error
//! - `3-125`: Specific errors a script can react to
//! - `126-255`: Reserved by shell

use crate::error::ExemplarError;

/// Standard exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Operation succeeded (code 0)
    Success = 0,

    /// Unspecified error occurred (code 1)
    GeneralError = 1,

    /// No committed store, or a file named on the command line is missing (code 3)
    NotFound = 3,

    /// Corpus could not be parsed (code 4)
    ParseError = 4,

    /// File I/O error (code 5)
    IoError = 5,

    /// Configuration error (code 6)
    ConfigError = 6,

    /// Persisted state is corrupted (code 7)
    StoreCorrupted = 7,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl ExitCode {
    /// Convert an `ExemplarError` to the appropriate exit code.
    pub fn from_error(error: &ExemplarError) -> Self {
        match error {
            ExemplarError::NotFound { .. } => ExitCode::NotFound,
            ExemplarError::CorruptState { .. } => ExitCode::StoreCorrupted,
            ExemplarError::CorpusParse { .. } => ExitCode::ParseError,
            ExemplarError::Persistence { .. } => ExitCode::IoError,
            ExemplarError::Config { .. } => ExitCode::ConfigError,
            ExemplarError::InvalidState { .. }
            | ExemplarError::DimensionMismatch { .. }
            | ExemplarError::EmbeddingFailure(_) => ExitCode::GeneralError,
        }
    }

    /// Get a human-readable description of the exit code.
    pub fn description(&self) -> &'static str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::NotFound => "Not found",
            ExitCode::ParseError => "Parse error",
            ExitCode::IoError => "I/O error",
            ExitCode::ConfigError => "Configuration error",
            ExitCode::StoreCorrupted => "Store corrupted",
        }
    }
}
