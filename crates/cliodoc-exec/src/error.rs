//! Error types for program execution.

use cliodoc_program::ProgramError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from running a program.
#[derive(Debug, Error)]
pub enum ExecError {
    /// No executable path and the name is not on PATH.
    #[error("could not find executable {name} for program {program}")]
    ExecutableNotFound {
        /// Program name.
        program: String,
        /// Name searched on PATH.
        name: String,
    },

    /// The process could not be started.
    #[error("could not start {} for program {program}", path.display())]
    Spawn {
        /// Program name.
        program: String,
        /// Resolved executable.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Feeding stdin, reading output or waiting for exit failed.
    #[error("could not run program {program}")]
    Io {
        /// Program name.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The execution context was cancelled and the child was terminated.
    #[error("execution of program {program} was cancelled")]
    Cancelled {
        /// Program name.
        program: String,
    },

    /// Argument compilation failed.
    #[error(transparent)]
    Program(#[from] ProgramError),
}

/// Result type alias for execution.
pub type ExecResult<T> = std::result::Result<T, ExecError>;
