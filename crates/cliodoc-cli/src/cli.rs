//! CLI argument definitions using clap derive macros.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use cliodoc_common_config::{CliodocConfig, ConfigLoader};
use cliodoc_exec::{CancellationWatcher, ExecutionContext, SystemEnvironment};
use cliodoc_program::{load_repositories, Registry};
use tracing::debug;

use crate::commands::{ListCommand, RenderCommand, RunCommand, TestCommand};
use crate::error::CliError;

/// cliodoc - executable Markdown documentation
///
/// Render Markdown templates whose directives run real programs, and
/// golden-test the program definitions they use.
#[derive(Debug, Parser)]
#[command(
    name = "cliodoc",
    version,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Increase verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "CLIODOC_CONFIG",
        value_hint = ValueHint::FilePath
    )]
    pub config: Option<PathBuf>,

    /// Output format for listings and reports
    #[arg(long, global = true, default_value = "text", value_enum)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render Markdown templates
    Render(RenderCommand),

    /// Run a single program from the repositories
    Run(RunCommand),

    /// Check programs against their golden expectations
    Test(TestCommand),

    /// List known programs
    #[command(visible_alias = "ls")]
    List(ListCommand),
}

/// Program repository selection shared by every subcommand
#[derive(Debug, Clone, Default, Args)]
pub struct RepositoryArgs {
    /// Directory of program definitions (repeatable)
    #[arg(short = 'r', long = "repository", value_hint = ValueHint::DirPath)]
    pub repositories: Vec<PathBuf>,
}

impl Cli {
    /// Load configuration from `--config` or the current project
    pub fn load_config(&self) -> Result<CliodocConfig, CliError> {
        match &self.config {
            Some(path) => Ok(ConfigLoader::load_file(path)?),
            None => {
                let cwd = std::env::current_dir()
                    .map_err(|e| CliError::io("could not determine current directory", e))?;
                Ok(ConfigLoader::new(cwd).load()?)
            }
        }
    }

    /// Execute the selected command
    pub async fn execute(
        self,
        config: CliodocConfig,
        cancellation: CancellationWatcher,
    ) -> Result<(), CliError> {
        let ctx = CommandContext {
            config,
            format: self.format,
            verbose: self.verbose,
            quiet: self.quiet,
            cancellation,
        };

        match self.command {
            Command::Render(cmd) => cmd.execute(&ctx).await,
            Command::Run(cmd) => cmd.execute(&ctx).await,
            Command::Test(cmd) => cmd.execute(&ctx).await,
            Command::List(cmd) => cmd.execute(&ctx).await,
        }
    }
}

/// Context passed to all commands
#[derive(Debug)]
pub struct CommandContext {
    pub config: CliodocConfig,
    pub format: OutputFormat,
    pub verbose: u8,
    pub quiet: bool,
    pub cancellation: CancellationWatcher,
}

impl CommandContext {
    /// Repository roots: the command line wins over the config file.
    pub fn repositories(&self, args: &RepositoryArgs) -> Vec<PathBuf> {
        if args.repositories.is_empty() {
            self.config.repositories.clone()
        } else {
            args.repositories.clone()
        }
    }

    /// Load the registry for the selected repositories.
    pub fn load_registry(&self, args: &RepositoryArgs) -> Result<Registry, CliError> {
        let roots = self.repositories(args);
        debug!(?roots, "loading program repositories");
        Ok(load_repositories(&roots)?)
    }

    /// Execution context over the process environment.
    pub fn execution(&self) -> ExecutionContext {
        ExecutionContext::new(Arc::new(SystemEnvironment), self.cancellation.clone())
            .with_kill_grace(Duration::from_millis(self.config.exec.kill_grace_ms))
    }

    /// Execution context running children in `dir`.
    pub fn execution_in(&self, dir: &Path) -> ExecutionContext {
        self.execution().with_working_dir(dir)
    }

    /// Whether informational output should be printed.
    pub fn is_quiet(&self) -> bool {
        self.quiet || self.config.render.quiet
    }
}
