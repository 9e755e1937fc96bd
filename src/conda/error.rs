//! Conda client errors.
//!
//! These convert into `anyhow::Error` at the call sites and can be
//! recovered with `downcast_ref::<CondaError>()`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CondaError {
    #[error("Conda not found in PATH and executable is not specified.")]
    ExecutableNotFound,

    #[error("{} is not a valid conda executable.", .0.display())]
    InvalidExecutable(PathBuf),

    /// Conda exited non-zero and explained why in its JSON reply.
    #[error("{message}")]
    CommandFailed {
        command: Vec<String>,
        message: String,
        exception_name: Option<String>,
        exception_type: Option<String>,
        stdout: String,
        stderr: String,
    },

    #[error("Unable to parse error from `{}` (exit code {code}).", .command.join(" "))]
    UnparsableError {
        command: Vec<String>,
        code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("Failed to parse output of `{}`.", .command.join(" "))]
    UnparsableOutput {
        command: Vec<String>,
        stdout: String,
        stderr: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CondaError {
    /// The command line that produced this error, if any.
    pub fn command(&self) -> Option<&[String]> {
        match self {
            CondaError::CommandFailed { command, .. }
            | CondaError::UnparsableError { command, .. }
            | CondaError::UnparsableOutput { command, .. } => Some(command),
            CondaError::ExecutableNotFound | CondaError::InvalidExecutable(_) => None,
        }
    }
}
