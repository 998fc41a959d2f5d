//! Markdown rendering for cliodoc.
//!
//! A [`Renderer`] scans documents for directives, runs the referenced
//! programs through [`cliodoc_exec`], and substitutes their captured output.
//! [`WatchCoordinator`] keeps outputs current while sources change.

pub mod directive;
pub mod engine;
pub mod error;
pub mod fs;
pub mod options;
pub mod watch;

pub use engine::{RenderTarget, Renderer};
pub use error::{RenderError, RenderResult};
pub use options::{Delimiters, RenderOptions, DEFAULT_MASK};
pub use watch::{output_path_for, WatchCoordinator};
