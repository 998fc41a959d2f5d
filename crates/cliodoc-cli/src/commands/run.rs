//! Run command implementation.

use clap::Parser;
use cliodoc_program::RuntimeValues;
use serde_yaml::Value;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::cli::{CommandContext, RepositoryArgs};
use crate::error::CliError;

/// Run a single program from the repositories
#[derive(Debug, Parser)]
pub struct RunCommand {
    /// Program name
    pub name: String,

    #[command(flatten)]
    pub repository: RepositoryArgs,

    /// Bind a flag or argument (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_binding)]
    pub bindings: Vec<(String, String)>,

    /// Standard input for the program, replacing its declared stdin
    #[arg(long)]
    pub stdin: Option<String>,
}

fn parse_binding(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {raw:?}")),
    }
}

impl RunCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<(), CliError> {
        let registry = ctx.load_registry(&self.repository)?;
        let program = registry
            .get(&self.name)
            .ok_or_else(|| CliError::not_found("program", &self.name))?;

        let mut values = RuntimeValues::new();
        for (key, value) in &self.bindings {
            if !program.has_parameter(key) {
                return Err(CliError::validation(format!(
                    "program {} has no flag or argument {key}",
                    program.name
                )));
            }
            values.insert(key.clone(), Value::String(value.clone()));
        }

        let mut stdout = tokio::io::stdout();
        let outcome = cliodoc_exec::run(
            &ctx.execution(),
            program,
            &values,
            self.stdin.as_deref(),
            &mut stdout,
        )
        .await?;
        stdout
            .flush()
            .await
            .map_err(|e| CliError::io("could not flush stdout", e))?;

        debug!(exit_code = outcome.exit_code, duration = ?outcome.duration, "program finished");
        if outcome.success() {
            Ok(())
        } else {
            Err(CliError::ProgramExit {
                program: program.name.clone(),
                code: outcome.exit_code,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_binding() {
        assert_eq!(
            parse_binding("a=b=c").unwrap(),
            ("a".to_string(), "b=c".to_string())
        );
        assert_eq!(parse_binding("empty=").unwrap().1, "");
        assert!(parse_binding("=x").is_err());
        assert!(parse_binding("plain").is_err());
    }
}
