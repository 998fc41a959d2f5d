//! List command implementation.

use anyhow::Context;
use clap::Parser;
use serde::Serialize;

use crate::cli::{CommandContext, OutputFormat, RepositoryArgs};
use crate::error::CliError;

/// List known programs
#[derive(Debug, Parser)]
pub struct ListCommand {
    #[command(flatten)]
    pub repository: RepositoryArgs,
}

#[derive(Debug, Serialize)]
struct ProgramSummary<'a> {
    name: &'a str,
    description: &'a str,
    golden: bool,
}

impl ListCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<(), CliError> {
        let registry = ctx.load_registry(&self.repository)?;
        let summaries: Vec<_> = registry
            .iter()
            .map(|p| ProgramSummary {
                name: &p.name,
                description: &p.description,
                golden: p.has_expectations(),
            })
            .collect();

        match ctx.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&summaries)
                    .context("could not encode program list")?;
                println!("{json}");
            }
            OutputFormat::Text => {
                let width = summaries.iter().map(|s| s.name.len()).max().unwrap_or(0);
                for summary in &summaries {
                    if summary.description.is_empty() {
                        println!("{}", summary.name);
                    } else {
                        println!("{:width$}  {}", summary.name, summary.description);
                    }
                }
            }
        }
        Ok(())
    }
}
