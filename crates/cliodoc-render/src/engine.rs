//! The render engine.

use crate::directive::{self, Action, Invocation, ProgramRef, ScanError, Segment};
use crate::error::{RenderError, RenderResult};
use crate::fs::{is_same_file, write_atomic};
use crate::options::RenderOptions;
use cliodoc_exec::ExecutionContext;
use cliodoc_program::{render_value, Parameter, ParameterType, Program, Registry, RuntimeValues};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

/// Log at info when verbose, debug otherwise.
macro_rules! progress {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            info!($($arg)+);
        } else {
            debug!($($arg)+);
        }
    };
}

const AD_HOC_PATH_KEY: &str = "path";
const AD_HOC_STDIN_KEY: &str = "stdin";

/// Where batch renders write their results.
#[derive(Debug, Clone, Default)]
pub struct RenderTarget {
    /// Output root; file inputs land here under their file name.
    pub output_dir: Option<PathBuf>,
    /// Single output file, only valid with exactly one input file.
    pub output_file: Option<PathBuf>,
}

impl RenderTarget {
    /// Render into a directory.
    pub fn directory(dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: Some(dir.into()),
            output_file: None,
        }
    }

    /// Render into one file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: None,
            output_file: Some(path.into()),
        }
    }
}

/// Program, runtime values and stdin resolved for one directive.
struct Resolved {
    program: Program,
    values: RuntimeValues,
    stdin: Option<String>,
}

/// Expands directives in documents by running programs.
#[derive(Debug, Clone)]
pub struct Renderer {
    options: RenderOptions,
    ctx: ExecutionContext,
}

impl Renderer {
    /// Create a renderer.
    pub fn new(options: RenderOptions, ctx: ExecutionContext) -> Self {
        Self { options, ctx }
    }

    /// Active options.
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Programs available to directives.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.options.registry
    }

    /// Swap the program registry, e.g. after repositories changed.
    pub fn set_registry(&mut self, registry: impl Into<Arc<Registry>>) {
        self.options.registry = registry.into();
    }

    /// Execution context used for directive programs.
    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Render `text`, replacing every directive with its program's output.
    ///
    /// `origin` only labels errors and log lines.
    pub async fn render_text(&self, text: &str, origin: &Path) -> RenderResult<String> {
        let segments = directive::scan(
            text,
            &self.options.delimiters,
            self.options.with_template,
            self.options.with_yaml_markers,
        )
        .map_err(|e| match e {
            ScanError::Unterminated { line, closing } => RenderError::Unterminated {
                path: origin.to_path_buf(),
                line,
                closing,
            },
        })?;

        let mut output = String::with_capacity(text.len());
        for segment in segments {
            match segment {
                Segment::Text(literal) => output.push_str(literal),
                Segment::Directive(d) => {
                    let action =
                        directive::parse(&d).map_err(|message| RenderError::MalformedDirective {
                            path: origin.to_path_buf(),
                            line: d.line,
                            message,
                        })?;
                    if let Action::Run(invocation) = action {
                        let captured = self.execute(invocation, origin, d.line).await?;
                        output.push_str(&captured);
                    }
                }
            }
        }
        Ok(output)
    }

    async fn execute(
        &self,
        invocation: Invocation,
        origin: &Path,
        line: usize,
    ) -> RenderResult<String> {
        let resolved = self.resolve(invocation, origin, line)?;
        let name = resolved.program.name.clone();
        progress!(self.options.verbose, program = %name, source = %origin.display(), line, "running directive");

        let mut captured: Vec<u8> = Vec::new();
        let outcome = cliodoc_exec::run(
            &self.ctx,
            &resolved.program,
            &resolved.values,
            resolved.stdin.as_deref(),
            &mut captured,
        )
        .await
        .map_err(|source| RenderError::Execution {
            path: origin.to_path_buf(),
            line,
            source,
        })?;

        if !outcome.success() {
            warn!(
                program = %name,
                source = %origin.display(),
                line,
                exit_code = outcome.exit_code,
                "directive program exited with non-zero status"
            );
        }
        Ok(String::from_utf8_lossy(&captured).into_owned())
    }

    fn resolve(&self, invocation: Invocation, origin: &Path, line: usize) -> RenderResult<Resolved> {
        let allow = self.options.allow_program_creation;

        let program = match invocation.program {
            ProgramRef::Inline(program) if allow => *program,
            ProgramRef::Inline(program) => {
                return Err(RenderError::ProgramCreationDisabled {
                    name: program.name,
                    path: origin.to_path_buf(),
                    line,
                })
            }
            ProgramRef::Name(name) => match self.options.registry.get(&name) {
                Some(program) => program.clone(),
                None if allow => {
                    debug!(program = %name, "creating ad hoc program");
                    return ad_hoc(
                        name,
                        invocation.bindings,
                        invocation.positionals,
                        invocation.stdin,
                    )
                    .map_err(|message| RenderError::MalformedDirective {
                        path: origin.to_path_buf(),
                        line,
                        message,
                    });
                }
                None => {
                    return Err(RenderError::UnresolvedProgram {
                        name,
                        path: origin.to_path_buf(),
                        line,
                    })
                }
            },
        };

        let mut values = RuntimeValues::new();
        if invocation.positionals.len() > program.args.len() {
            return Err(RenderError::TooManyArguments {
                program: program.name,
                expected: program.args.len(),
                got: invocation.positionals.len(),
                path: origin.to_path_buf(),
                line,
            });
        }
        for (arg, word) in program.args.iter().zip(invocation.positionals) {
            values.insert(arg.name.clone(), Value::String(word));
        }

        for (key, value) in invocation.bindings {
            if !program.has_parameter(&key) {
                return Err(RenderError::UnknownParameter {
                    program: program.name,
                    name: key,
                    path: origin.to_path_buf(),
                    line,
                });
            }
            values.insert(key, value);
        }

        Ok(Resolved {
            program,
            values,
            stdin: invocation.stdin,
        })
    }

    /// Render one file into `output`.
    ///
    /// The document is rendered completely before anything is written; on
    /// error no output file is created or touched.
    #[instrument(skip(self), fields(op_id = %self.ctx.operation_id))]
    pub async fn render_file(&self, source: &Path, output: &Path) -> RenderResult<()> {
        if is_same_file(source, output) {
            return Err(RenderError::OutputOverwritesSource {
                path: source.to_path_buf(),
            });
        }

        let text = tokio::fs::read_to_string(source)
            .await
            .map_err(|e| RenderError::Read {
                path: source.to_path_buf(),
                source: e,
            })?;

        let rendered = self.render_text(&text, source).await?;

        write_atomic(output, rendered.as_bytes())
            .await
            .map_err(|e| RenderError::Write {
                path: output.to_path_buf(),
                source: e,
            })?;

        progress!(self.options.verbose, source = %source.display(), output = %output.display(), "rendered");
        Ok(())
    }

    /// Sources below `dir` matching the masks, relative to `dir`, sorted.
    pub fn collect_sources(&self, dir: &Path) -> RenderResult<Vec<PathBuf>> {
        let walker = WalkDir::new(dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !e
                        .file_name()
                        .to_str()
                        .map(|n| n.starts_with('.'))
                        .unwrap_or(false)
            });

        let mut sources = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| RenderError::Read {
                path: e.path().unwrap_or(dir).to_path_buf(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(dir) else {
                continue;
            };
            if self.options.matches(relative) {
                sources.push(relative.to_path_buf());
            }
        }
        Ok(sources)
    }

    /// Render every matching file below `source_dir` into the mirrored path
    /// below `output_dir`. Returns the written paths.
    ///
    /// Up to `jobs` files render at once; the first failure aborts the batch.
    #[instrument(skip(self), fields(op_id = %self.ctx.operation_id))]
    pub async fn render_directory(
        &self,
        source_dir: &Path,
        output_dir: &Path,
    ) -> RenderResult<Vec<PathBuf>> {
        let sources = self.collect_sources(source_dir)?;
        debug!(files = sources.len(), jobs = self.options.jobs, "rendering directory");

        let written: Vec<PathBuf> = stream::iter(sources)
            .map(|relative| async move {
                let output = output_dir.join(&relative);
                self.render_file(&source_dir.join(&relative), &output).await?;
                Ok::<_, RenderError>(output)
            })
            .buffer_unordered(self.options.jobs)
            .try_collect()
            .await?;

        let mut written = written;
        written.sort();
        Ok(written)
    }

    /// Render a batch of file and directory inputs.
    ///
    /// Directory inputs need `target.output_dir`. An output file is only
    /// accepted for a single input. File inputs without an output file go to
    /// `output_dir` (default `.`) under their own file name. Every target is
    /// checked before anything runs, including that no output would replace
    /// its own source.
    pub async fn render_paths(
        &self,
        inputs: &[PathBuf],
        target: &RenderTarget,
    ) -> RenderResult<Vec<PathBuf>> {
        if target.output_file.is_some() && inputs.len() > 1 {
            return Err(RenderError::AmbiguousOutputFile {
                inputs: inputs.len(),
            });
        }

        let mut planned = Vec::with_capacity(inputs.len());
        for input in inputs {
            let output = if input.is_dir() {
                target
                    .output_dir
                    .clone()
                    .ok_or_else(|| RenderError::MissingOutputDirectory {
                        input: input.clone(),
                    })?
            } else {
                match (&target.output_file, &target.output_dir) {
                    (Some(file), _) => file.clone(),
                    (None, dir) => {
                        let name = input.file_name().ok_or_else(|| RenderError::Read {
                            path: input.clone(),
                            source: std::io::Error::new(
                                std::io::ErrorKind::InvalidInput,
                                "input has no file name",
                            ),
                        })?;
                        dir.as_deref().unwrap_or(Path::new(".")).join(name)
                    }
                }
            };
            if is_same_file(input, &output) {
                return Err(RenderError::OutputOverwritesSource {
                    path: input.clone(),
                });
            }
            planned.push((input, output));
        }

        let mut written = Vec::new();
        for (input, output) in planned {
            if input.is_dir() {
                written.extend(self.render_directory(input, &output).await?);
            } else {
                self.render_file(input, &output).await?;
                written.push(output);
            }
        }
        Ok(written)
    }
}

/// Build a throwaway program from a directive's own words.
fn ad_hoc(
    name: String,
    bindings: Vec<(String, Value)>,
    positionals: Vec<String>,
    stdin: Option<String>,
) -> Result<Resolved, String> {
    let mut program = Program::new(name);
    let mut values = RuntimeValues::new();
    let mut stdin = stdin;

    for (key, value) in bindings {
        match key.as_str() {
            AD_HOC_PATH_KEY => program.path = render_value(ParameterType::String, &value)?,
            AD_HOC_STDIN_KEY => stdin = Some(render_value(ParameterType::String, &value)?),
            _ => {
                program
                    .flags
                    .push(Parameter::new(key.clone(), ParameterType::String, Value::Null));
                values.insert(key, value);
            }
        }
    }

    for (i, word) in positionals.into_iter().enumerate() {
        let name = format!("arg{i}");
        program
            .args
            .push(Parameter::new(name.clone(), ParameterType::String, Value::Null));
        values.insert(name, Value::String(word));
    }

    Ok(Resolved {
        program,
        values,
        stdin,
    })
}
