//! Error types for program definitions.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, editing or compiling programs.
#[derive(Debug, Error)]
pub enum ProgramError {
    /// A definition file could not be decoded.
    #[error("could not decode program from {} at line {}: {message}", path.display(), line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    Decode {
        /// File being decoded.
        path: PathBuf,
        /// Line of the failure, when known.
        line: Option<usize>,
        /// Decoder message.
        message: String,
    },

    /// A repository root is missing or unreadable.
    #[error("could not read repository {}", path.display())]
    Repository {
        /// Repository root or entry.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Two definitions share a name.
    #[error("program {name} already exists (redefined in {})", path.display())]
    DuplicateProgram {
        /// Program name.
        name: String,
        /// File holding the second definition.
        path: PathBuf,
    },

    /// No flag with that name.
    #[error("could not find flag {name} in program {program}")]
    UnknownFlag {
        /// Program name.
        program: String,
        /// Flag name.
        name: String,
    },

    /// No positional argument with that name.
    #[error("could not find arg {name} in program {program}")]
    UnknownArg {
        /// Program name.
        program: String,
        /// Argument name.
        name: String,
    },

    /// A value cannot be rendered for its declared type.
    #[error("could not render {kind} {parameter}: {message}")]
    RenderValue {
        /// `flag` or `arg`.
        kind: &'static str,
        /// Parameter name.
        parameter: String,
        /// What went wrong.
        message: String,
    },
}

impl ProgramError {
    pub(crate) fn decode(path: impl Into<PathBuf>, err: &serde_yaml::Error) -> Self {
        Self::Decode {
            path: path.into(),
            line: err.location().map(|l| l.line()),
            message: err.to_string(),
        }
    }
}

/// Result type alias for program operations.
pub type ProgramResult<T> = std::result::Result<T, ProgramError>;
