//! Golden-test verification of program outcomes.

use crate::run::RunOutcome;
use cliodoc_program::Program;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// One difference between a program's expectations and what it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mismatch {
    /// Standard output differs.
    Stdout {
        /// Declared output.
        expected: String,
        /// Captured output.
        actual: String,
    },
    /// Standard error differs.
    Stderr {
        /// Declared error output.
        expected: String,
        /// Captured error output.
        actual: String,
    },
    /// Exit status differs.
    StatusCode {
        /// Declared status, `0` when undeclared.
        expected: i32,
        /// Observed status.
        actual: i32,
    },
    /// An expected file does not exist.
    MissingFile {
        /// Path relative to the working directory.
        path: String,
    },
    /// An expected file has other content.
    FileContent {
        /// Path relative to the working directory.
        path: String,
        /// Declared content.
        expected: String,
        /// Content found.
        actual: String,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout { expected, actual } => {
                write!(f, "stdout differs: expected {expected:?}, got {actual:?}")
            }
            Self::Stderr { expected, actual } => {
                write!(f, "stderr differs: expected {expected:?}, got {actual:?}")
            }
            Self::StatusCode { expected, actual } => {
                write!(f, "exit status differs: expected {expected}, got {actual}")
            }
            Self::MissingFile { path } => write!(f, "expected file {path} was not written"),
            Self::FileContent {
                path,
                expected,
                actual,
            } => write!(
                f,
                "file {path} differs: expected {expected:?}, got {actual:?}"
            ),
        }
    }
}

/// Result of checking one program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldenReport {
    /// Name of the checked program.
    pub program: String,
    /// Every failed expectation, in check order.
    pub mismatches: Vec<Mismatch>,
}

impl GoldenReport {
    /// Whether every expectation held.
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Compare `outcome` against the expectations declared on `program`.
///
/// Stdout and stderr are only compared when an expectation is declared. The
/// exit status is always compared, an undeclared one meaning `0`. Expected
/// files are read relative to `work_dir`.
pub fn verify(program: &Program, outcome: &RunOutcome, work_dir: &Path) -> GoldenReport {
    let mut mismatches = Vec::new();

    if !program.expected_stdout.is_empty() && program.expected_stdout != outcome.stdout {
        mismatches.push(Mismatch::Stdout {
            expected: program.expected_stdout.clone(),
            actual: outcome.stdout.clone(),
        });
    }

    if !program.expected_error.is_empty() && program.expected_error != outcome.stderr {
        mismatches.push(Mismatch::Stderr {
            expected: program.expected_error.clone(),
            actual: outcome.stderr.clone(),
        });
    }

    if program.expected_status_code != outcome.exit_code {
        mismatches.push(Mismatch::StatusCode {
            expected: program.expected_status_code,
            actual: outcome.exit_code,
        });
    }

    for (rel, expected) in &program.expected_files {
        match std::fs::read_to_string(work_dir.join(rel)) {
            Ok(actual) if &actual == expected => {}
            Ok(actual) => mismatches.push(Mismatch::FileContent {
                path: rel.clone(),
                expected: expected.clone(),
                actual,
            }),
            Err(_) => mismatches.push(Mismatch::MissingFile { path: rel.clone() }),
        }
    }

    GoldenReport {
        program: program.name.clone(),
        mismatches,
    }
}
