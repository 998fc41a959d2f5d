//! Process execution for cliodoc programs.
//!
//! [`run`] resolves a [`Program`](cliodoc_program::Program)'s executable,
//! compiles its arguments, and spawns it with the environment supplied by an
//! [`EnvironmentProvider`]. Output is streamed into a caller-supplied sink and
//! also returned in a [`RunOutcome`] so [`golden::verify`] can compare it
//! against the program's expectations.

#![warn(missing_docs)]

pub mod cancel;
pub mod context;
pub mod environment;
pub mod error;
pub mod golden;
pub mod run;

pub use cancel::{CancellationToken, CancellationWatcher};
pub use context::ExecutionContext;
pub use environment::{EnvironmentProvider, FixedEnvironment, SystemEnvironment};
pub use error::{ExecError, ExecResult};
pub use golden::{verify, GoldenReport, Mismatch};
pub use run::{resolve_executable, run, RunOutcome};
