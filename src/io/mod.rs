//! CLI output plumbing: exit codes and the JSON response envelope.

pub mod exit_code;
pub mod format;

pub use exit_code::ExitCode;
pub use format::{Failure, Report, Status};
