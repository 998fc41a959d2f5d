//! cliodoc command line library.
//!
//! Argument parsing, command dispatch and error reporting for the `cliodoc`
//! binary.

pub mod cli;
pub mod commands;
pub mod error;

pub use error::CliError;
