//! Configuration for cliodoc.
//!
//! Settings live in `.cliodoc/config.yaml` under the project directory. Every
//! field is optional; command-line flags override whatever the file sets.

pub mod loader;
pub mod types;

pub use loader::{ConfigError, ConfigLoader, CONFIG_DIR, CONFIG_FILE};
pub use types::{CliodocConfig, ExecConfig, RenderConfig};
