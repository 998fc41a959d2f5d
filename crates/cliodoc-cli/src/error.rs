//! CLI error handling and exit codes.

use std::error::Error as StdError;
use std::io;
use std::process::ExitCode;

use cliodoc_common_config::ConfigError;
use cliodoc_exec::ExecError;
use cliodoc_program::ProgramError;
use cliodoc_render::RenderError;
use thiserror::Error;

type BoxError = Box<dyn StdError + Send + Sync>;

/// CLI error type
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{message}")]
    Config {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("{message}")]
    Io {
        message: String,
        #[source]
        source: io::Error,
    },

    #[error("{message}")]
    Validation {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("{message}")]
    Execution {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("{resource_type} not found: {resource_name}")]
    NotFound {
        resource_type: String,
        resource_name: String,
    },

    #[error("program {program} exited with status {code}")]
    ProgramExit { program: String, code: i32 },

    #[error("{failed} of {total} golden test(s) failed")]
    GoldenMismatch { failed: usize, total: usize },

    #[error("interrupted")]
    Interrupted,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Get the numeric exit status for this error
    pub fn code(&self) -> u8 {
        match self {
            Self::Config { .. } => 2,
            Self::Io { .. } => 3,
            Self::Validation { .. } => 5,
            Self::Execution { .. } => 6,
            Self::GoldenMismatch { .. } => 7,
            Self::Interrupted => 130,
            Self::ProgramExit { code, .. } => u8::try_from(*code)
                .ok()
                .filter(|c| *c != 0)
                .unwrap_or(1),
            Self::NotFound { .. } | Self::Other(_) => 1,
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// The message followed by every underlying cause.
    pub fn report(&self) -> String {
        let mut report = self.to_string();
        let mut cause = self.source();
        while let Some(err) = cause {
            report.push_str(": ");
            report.push_str(&err.to_string());
            cause = err.source();
        }
        report
    }

    /// Create a config error
    pub fn config(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            source: None,
        }
    }

    /// Create an IO error
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a not found error
    pub fn not_found(resource_type: impl Into<String>, resource_name: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            resource_name: resource_name.into(),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::config("failed to load configuration", err)
    }
}

impl From<ProgramError> for CliError {
    fn from(err: ProgramError) -> Self {
        match err {
            ProgramError::UnknownFlag { .. } | ProgramError::UnknownArg { .. } => Self::Validation {
                message: "invalid parameter binding".to_string(),
                source: Some(Box::new(err)),
            },
            ProgramError::RenderValue { .. } => Self::Validation {
                message: "invalid parameter value".to_string(),
                source: Some(Box::new(err)),
            },
            _ => Self::config("failed to load program repositories", err),
        }
    }
}

impl From<ExecError> for CliError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::Cancelled { .. } => Self::Interrupted,
            ExecError::Program(inner) => inner.into(),
            other => Self::Execution {
                message: "execution failed".to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}

impl From<RenderError> for CliError {
    fn from(err: RenderError) -> Self {
        if err.is_cancelled() {
            return Self::Interrupted;
        }
        let message = "render failed".to_string();
        match err {
            RenderError::Registry(inner) => inner.into(),
            RenderError::InvalidDelimiters { .. }
            | RenderError::EmptyDelimiter
            | RenderError::InvalidGlob { .. }
            | RenderError::MissingOutputDirectory { .. }
            | RenderError::AmbiguousOutputFile { .. }
            | RenderError::OutputOverwritesSource { .. } => Self::Validation {
                message: "invalid render settings".to_string(),
                source: Some(Box::new(err)),
            },
            RenderError::Read { path, source } => Self::Io {
                message: format!("could not read {}", path.display()),
                source,
            },
            RenderError::Write { path, source } => Self::Io {
                message: format!("could not write {}", path.display()),
                source,
            },
            other => Self::Execution {
                message,
                source: Some(Box::new(other)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn code(err: CliError) -> u8 {
        err.code()
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(code(CliError::validation("x")), 5);
        assert_eq!(code(CliError::Interrupted), 130);
        assert_eq!(
            code(CliError::GoldenMismatch {
                failed: 1,
                total: 2
            }),
            7
        );
        assert_eq!(
            code(CliError::ProgramExit {
                program: "x".into(),
                code: 3
            }),
            3
        );
        assert_eq!(
            code(CliError::ProgramExit {
                program: "x".into(),
                code: 300
            }),
            1
        );
    }

    #[test]
    fn test_render_errors_map_to_kinds() {
        let err: CliError = RenderError::AmbiguousOutputFile { inputs: 2 }.into();
        assert!(matches!(err, CliError::Validation { .. }));

        let err: CliError = RenderError::UnresolvedProgram {
            name: "nope".into(),
            path: PathBuf::from("doc.md"),
            line: 3,
        }
        .into();
        assert!(matches!(err, CliError::Execution { .. }));
        assert_eq!(err.report(), "render failed: doc.md:3: unknown program nope");

        let err: CliError = RenderError::Execution {
            path: PathBuf::from("doc.md"),
            line: 1,
            source: ExecError::Cancelled {
                program: "sleep".into(),
            },
        }
        .into();
        assert!(matches!(err, CliError::Interrupted));
    }

    #[test]
    fn test_registry_errors_are_config() {
        let err: CliError = ProgramError::DuplicateProgram {
            name: "foo".into(),
            path: PathBuf::from("b/foo.yaml"),
        }
        .into();
        assert!(matches!(err, CliError::Config { .. }));
    }
}
