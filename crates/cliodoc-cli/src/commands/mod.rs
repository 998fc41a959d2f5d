//! Subcommand implementations.

pub mod list;
pub mod render;
pub mod run;

pub use list::ListCommand;
pub use render::RenderCommand;
pub use run::RunCommand;
pub use test::TestCommand;
