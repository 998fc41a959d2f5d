//! Render command implementation.

use std::path::PathBuf;

use clap::{Parser, ValueHint};
use cliodoc_render::{Delimiters, RenderOptions, RenderTarget, Renderer, WatchCoordinator};
use tracing::info;

use crate::cli::{CommandContext, RepositoryArgs};
use crate::error::CliError;

/// Render Markdown templates
#[derive(Debug, Parser)]
pub struct RenderCommand {
    /// Files or directories to render
    #[arg(required = true, value_hint = ValueHint::AnyPath)]
    pub inputs: Vec<PathBuf>,

    #[command(flatten)]
    pub repository: RepositoryArgs,

    /// Directory receiving rendered files
    #[arg(short = 'o', long, value_hint = ValueHint::DirPath)]
    pub output_directory: Option<PathBuf>,

    /// Single output file (only with one input file)
    #[arg(long, conflicts_with = "output_directory", value_hint = ValueHint::FilePath)]
    pub output_file: Option<PathBuf>,

    /// Keep running and re-render inputs as they change
    #[arg(short, long)]
    pub watch: bool,

    /// Mask of files to render in directories (repeatable)
    #[arg(long = "glob", value_name = "GLOB")]
    pub globs: Vec<String>,

    /// Ignore delimiter-bounded template directives
    #[arg(long)]
    pub no_template: bool,

    /// Ignore `<!-- cliodoc ... -->` blocks
    #[arg(long)]
    pub no_yaml_markers: bool,

    /// Template delimiters as LEFT,RIGHT
    #[arg(long, value_delimiter = ',', value_name = "LEFT,RIGHT")]
    pub delimiters: Option<Vec<String>>,

    /// Let documents declare programs that are not in a repository
    #[arg(long)]
    pub allow_program_creation: bool,

    /// Files rendered concurrently in directory mode
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

impl RenderCommand {
    fn options(&self, ctx: &CommandContext) -> Result<RenderOptions, CliError> {
        let settings = &ctx.config.render;

        let delimiters = Delimiters::from_list(
            self.delimiters
                .as_deref()
                .unwrap_or(settings.delimiters.as_slice()),
        )?;
        let globs = if self.globs.is_empty() {
            &settings.globs
        } else {
            &self.globs
        };
        let jobs = self.jobs.unwrap_or(settings.jobs);
        if jobs == 0 {
            return Err(CliError::validation("--jobs must be greater than 0"));
        }

        Ok(RenderOptions::new()
            .with_template(settings.with_template && !self.no_template)
            .with_yaml_markers(settings.with_yaml_markers && !self.no_yaml_markers)
            .delimiters(delimiters)
            .allow_program_creation(settings.allow_program_creation || self.allow_program_creation)
            .verbose(!ctx.is_quiet())
            .jobs(jobs)
            .masks(globs.as_slice())?)
    }

    fn target(&self, ctx: &CommandContext) -> RenderTarget {
        let output_dir = self
            .output_directory
            .clone()
            .unwrap_or_else(|| ctx.config.render.output_directory.clone());

        RenderTarget {
            output_dir: Some(output_dir).filter(|dir| !dir.as_os_str().is_empty()),
            output_file: self.output_file.clone(),
        }
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<(), CliError> {
        if self.watch && self.output_file.is_some() {
            return Err(CliError::validation(
                "--watch writes into an output directory, not --output-file",
            ));
        }

        // Settings are validated before any repository is read.
        let options = self.options(ctx)?;
        let target = self.target(ctx);
        let registry = ctx.load_registry(&self.repository)?;
        let renderer = Renderer::new(options.registry(registry), ctx.execution());

        let written = renderer.render_paths(&self.inputs, &target).await?;
        if !ctx.is_quiet() {
            info!(files = written.len(), "render complete");
        }

        if !self.watch {
            return Ok(());
        }

        let Some(output_dir) = target.output_dir else {
            return Err(CliError::validation("--watch needs an output directory"));
        };
        WatchCoordinator::new(renderer, self.inputs.clone(), output_dir)
            .repositories(ctx.repositories(&self.repository))
            .run(ctx.cancellation.clone())
            .await?;
        Ok(())
    }
}
