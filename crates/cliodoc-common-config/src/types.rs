//! Configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliodocConfig {
    /// Program repositories loaded into the registry.
    pub repositories: Vec<PathBuf>,
    /// Rendering settings.
    pub render: RenderConfig,
    /// Execution settings.
    pub exec: ExecConfig,
}

/// Rendering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Where rendered files go.
    pub output_directory: PathBuf,
    /// Masks of files rendered in directory and watch mode.
    pub globs: Vec<String>,
    /// Recognize delimiter-bounded template directives.
    pub with_template: bool,
    /// Recognize `<!-- cliodoc ... -->` blocks.
    pub with_yaml_markers: bool,
    /// Left and right template delimiters.
    pub delimiters: Vec<String>,
    /// Let documents declare programs inline.
    pub allow_program_creation: bool,
    /// Only log problems.
    pub quiet: bool,
    /// Files rendered concurrently.
    pub jobs: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("."),
            globs: vec!["**/*.tmpl.md".to_string()],
            with_template: true,
            with_yaml_markers: true,
            delimiters: vec!["{{".to_string(), "}}".to_string()],
            allow_program_creation: false,
            quiet: false,
            jobs: 1,
        }
    }
}

/// Execution settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    /// Milliseconds between SIGTERM and SIGKILL for cancelled programs.
    pub kill_grace_ms: u64,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            kill_grace_ms: 5_000,
        }
    }
}
