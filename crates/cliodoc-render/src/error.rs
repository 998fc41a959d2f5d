//! Error types for rendering.

use cliodoc_exec::ExecError;
use cliodoc_program::ProgramError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while rendering documents or watching for changes.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Delimiters must be exactly a left/right pair.
    #[error("delimiters must be a left/right pair, got {count} value(s)")]
    InvalidDelimiters {
        /// Number of values supplied.
        count: usize,
    },

    /// A delimiter was empty.
    #[error("delimiters must not be empty")]
    EmptyDelimiter,

    /// A glob mask did not parse.
    #[error("invalid glob {pattern}")]
    InvalidGlob {
        /// The offending mask.
        pattern: String,
        /// Parser error.
        #[source]
        source: glob::PatternError,
    },

    /// A directory was given without an output directory.
    #[error("an output directory is required to render directory {}", input.display())]
    MissingOutputDirectory {
        /// The directory input.
        input: PathBuf,
    },

    /// One output file for several inputs.
    #[error("an output file can only be used with a single input, got {inputs}")]
    AmbiguousOutputFile {
        /// Number of inputs.
        inputs: usize,
    },

    /// The output path is the source itself.
    #[error("refusing to overwrite source {} with its rendered output", path.display())]
    OutputOverwritesSource {
        /// The source path.
        path: PathBuf,
    },

    /// A source could not be read.
    #[error("could not read {}", path.display())]
    Read {
        /// Source path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An output could not be written.
    #[error("could not write {}", path.display())]
    Write {
        /// Output path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A directive was opened but never closed.
    #[error("{}:{line}: unterminated directive, missing {closing:?}", path.display())]
    Unterminated {
        /// Source path.
        path: PathBuf,
        /// Line of the opening delimiter.
        line: usize,
        /// Expected closing text.
        closing: String,
    },

    /// A directive body could not be parsed.
    #[error("{}:{line}: malformed directive: {message}", path.display())]
    MalformedDirective {
        /// Source path.
        path: PathBuf,
        /// Line of the directive.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// The referenced program is not registered.
    #[error("{}:{line}: unknown program {name}", path.display())]
    UnresolvedProgram {
        /// Program name.
        name: String,
        /// Source path.
        path: PathBuf,
        /// Line of the directive.
        line: usize,
    },

    /// An inline program was declared but creation is disabled.
    #[error("{}:{line}: inline program {name} requires program creation to be allowed", path.display())]
    ProgramCreationDisabled {
        /// Program name.
        name: String,
        /// Source path.
        path: PathBuf,
        /// Line of the directive.
        line: usize,
    },

    /// A binding names no flag or argument of the program.
    #[error("{}:{line}: program {program} has no parameter {name}", path.display())]
    UnknownParameter {
        /// Program name.
        program: String,
        /// Binding name.
        name: String,
        /// Source path.
        path: PathBuf,
        /// Line of the directive.
        line: usize,
    },

    /// More positional words than declared args.
    #[error("{}:{line}: program {program} takes {expected} positional argument(s), got {got}", path.display())]
    TooManyArguments {
        /// Program name.
        program: String,
        /// Declared args.
        expected: usize,
        /// Supplied words.
        got: usize,
        /// Source path.
        path: PathBuf,
        /// Line of the directive.
        line: usize,
    },

    /// Running the directive's program failed.
    #[error("{}:{line}: could not execute directive", path.display())]
    Execution {
        /// Source path.
        path: PathBuf,
        /// Line of the directive.
        line: usize,
        /// Underlying error.
        #[source]
        source: ExecError,
    },

    /// Loading program repositories failed.
    #[error(transparent)]
    Registry(#[from] ProgramError),

    /// The file watcher failed.
    #[error("file watcher failed")]
    Watch(#[from] notify::Error),

    /// The file watcher stopped delivering events.
    #[error("file watcher stopped unexpectedly")]
    WatchClosed,
}

impl RenderError {
    /// Whether the failure is a cancelled execution.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Execution {
                source: ExecError::Cancelled { .. },
                ..
            }
        )
    }
}

/// Result type alias for rendering.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
