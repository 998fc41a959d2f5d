//! Program definitions for cliodoc.
//!
//! A [`Program`] declares how to invoke an external executable: its path,
//! verbs, typed flags and positional arguments, environment and stdin, plus
//! golden-test expectations. Programs are loaded from repositories of YAML
//! files into a [`Registry`], and [`compute_args`] turns a program and a set of
//! runtime bindings into a concrete argument vector.

pub mod args;
pub mod error;
pub mod program;
pub mod registry;
pub mod value;

pub use args::{compute_args, RuntimeValues};
pub use error::{ProgramError, ProgramResult};
pub use program::{Parameter, Program};
pub use registry::{load_programs_from_dir, load_repositories, Registry};
pub use value::{render_value, DateValue, ParameterType, TypedValue};
