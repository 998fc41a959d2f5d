//! Render engine options.

use crate::error::{RenderError, RenderResult};
use cliodoc_program::Registry;
use glob::{MatchOptions, Pattern};
use std::path::Path;
use std::sync::Arc;

/// Default left delimiter of template directives.
pub const DEFAULT_LEFT_DELIMITER: &str = "{{";
/// Default right delimiter of template directives.
pub const DEFAULT_RIGHT_DELIMITER: &str = "}}";
/// Files rendered in directory and watch mode by default.
pub const DEFAULT_MASK: &str = "**/*.tmpl.md";

/// Left/right delimiter pair of template directives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub left: String,
    pub right: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            left: DEFAULT_LEFT_DELIMITER.to_string(),
            right: DEFAULT_RIGHT_DELIMITER.to_string(),
        }
    }
}

impl Delimiters {
    /// Build from a list that must hold exactly a left and a right value.
    pub fn from_list<S: AsRef<str>>(values: &[S]) -> RenderResult<Self> {
        match values {
            [left, right] => Self::new(left.as_ref(), right.as_ref()),
            _ => Err(RenderError::InvalidDelimiters {
                count: values.len(),
            }),
        }
    }

    /// Build from a pair, rejecting empty delimiters.
    pub fn new(left: &str, right: &str) -> RenderResult<Self> {
        if left.is_empty() || right.is_empty() {
            return Err(RenderError::EmptyDelimiter);
        }
        Ok(Self {
            left: left.to_string(),
            right: right.to_string(),
        })
    }
}

/// Options for [`Renderer`](crate::Renderer).
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Programs available to directives.
    pub registry: Arc<Registry>,
    /// Recognize delimiter-bounded template directives.
    pub with_template: bool,
    /// Recognize YAML marker blocks.
    pub with_yaml_markers: bool,
    /// Template delimiters.
    pub delimiters: Delimiters,
    /// Let directives declare programs that are not registered.
    pub allow_program_creation: bool,
    /// Log per-directive progress at info level.
    pub verbose: bool,
    /// Files picked up in directory and watch mode.
    pub masks: Vec<Pattern>,
    /// Files rendered concurrently in directory mode.
    pub jobs: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            with_template: true,
            with_yaml_markers: true,
            delimiters: Delimiters::default(),
            allow_program_creation: false,
            verbose: true,
            // The default mask is a valid pattern.
            masks: Pattern::new(DEFAULT_MASK).into_iter().collect(),
            jobs: 1,
        }
    }
}

impl RenderOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the program registry.
    pub fn registry(mut self, registry: impl Into<Arc<Registry>>) -> Self {
        self.registry = registry.into();
        self
    }

    /// Enable or disable template directives.
    pub fn with_template(mut self, enabled: bool) -> Self {
        self.with_template = enabled;
        self
    }

    /// Enable or disable YAML marker directives.
    pub fn with_yaml_markers(mut self, enabled: bool) -> Self {
        self.with_yaml_markers = enabled;
        self
    }

    /// Set the template delimiters.
    pub fn delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    /// Allow inline program creation.
    pub fn allow_program_creation(mut self, allowed: bool) -> Self {
        self.allow_program_creation = allowed;
        self
    }

    /// Verbose or quiet progress logging.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Replace the glob masks.
    pub fn masks<S: AsRef<str>>(mut self, masks: &[S]) -> RenderResult<Self> {
        self.masks = masks
            .iter()
            .map(|m| {
                Pattern::new(m.as_ref()).map_err(|source| RenderError::InvalidGlob {
                    pattern: m.as_ref().to_string(),
                    source,
                })
            })
            .collect::<RenderResult<_>>()?;
        Ok(self)
    }

    /// Set the directory-mode worker count (at least one).
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Whether `relative` (a path below a render root) matches a mask.
    pub fn matches(&self, relative: &Path) -> bool {
        let options = MatchOptions {
            require_literal_separator: true,
            ..MatchOptions::default()
        };
        self.masks
            .iter()
            .any(|mask| mask.matches_path_with(relative, options))
    }
}
