//! What `--json` prints.
//!
//! Every JSON-capable command writes one [`Report`] to stdout, whether it
//! succeeded or not. Scripts branch on `status` and `exit_code`; `data`
//! carries the command's own payload (a `BuildReport`, the search hits or
//! `StoreStats`).

use std::time::Duration;

use serde::Serialize;

use crate::error::ExemplarError;
use crate::io::exit_code::ExitCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Error,
}

/// Why a command failed, in machine-readable form.
#[derive(Debug, Serialize)]
pub struct Failure {
    /// Stable identifier from [`ExemplarError::status_code`]
    pub code: String,
    /// Short name of the exit code class
    pub kind: &'static str,
    pub message: String,
    pub suggestions: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct Report<T: Serialize> {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Failure>,
    pub exit_code: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    pub version: &'static str,
}

impl<T: Serialize> Report<T> {
    pub fn success(data: T, elapsed: Option<Duration>) -> Self {
        Self {
            status: Status::Success,
            data: Some(data),
            error: None,
            exit_code: ExitCode::Success as u8,
            elapsed_ms: elapsed.map(|d| d.as_millis() as u64),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

impl Report<()> {
    pub fn failure(error: &ExemplarError) -> Self {
        let exit_code = ExitCode::from_error(error);
        Self {
            status: Status::Error,
            data: None,
            error: Some(Failure {
                code: error.status_code(),
                kind: exit_code.description(),
                message: error.to_string(),
                suggestions: error.recovery_suggestions(),
            }),
            exit_code: exit_code as u8,
            elapsed_ms: None,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
