//! cliodoc - executable Markdown documentation.
//!
//! Main entry point for the `cliodoc` binary.

use std::process::ExitCode;

use clap::Parser;
use cliodoc_cli::cli::Cli;
use cliodoc_cli::CliError;
use cliodoc_common_log::LogConfig;
use cliodoc_exec::CancellationToken;
use tracing::{error, warn};

/// Application exit codes
#[repr(u8)]
pub enum Exit {
    Success = 0,
    GeneralError = 1,
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit as u8)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env().with_verbosity(cli.verbose, cli.quiet);
    if let Err(e) = cliodoc_common_log::init(log_config) {
        eprintln!("warning: {e}");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return Exit::GeneralError.into();
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => Exit::Success.into(),
        Err(e) => {
            error!("{}", e.report());
            e.exit_code()
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let (token, watcher) = CancellationToken::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            token.cancel();
        }
    });

    let config = cli.load_config()?;
    cli.execute(config, watcher).await
}
