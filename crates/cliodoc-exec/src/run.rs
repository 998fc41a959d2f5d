//! Program execution.

use crate::context::ExecutionContext;
use crate::error::{ExecError, ExecResult};
use cliodoc_program::{compute_args, Program, RuntimeValues};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::{debug, instrument, warn};

const READ_CHUNK: usize = 8 * 1024;

/// What a finished program produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Exit code; `128 + signal` when killed by a signal.
    pub exit_code: i32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Standard output and error interleaved in arrival order.
    pub combined: String,
    /// Wall clock time.
    pub duration: Duration,
}

impl RunOutcome {
    /// Whether the program exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Default)]
struct Captured {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    combined: Vec<u8>,
}

/// Resolve the executable for `program`.
///
/// An explicit `path` wins; relative paths are taken from the working
/// directory. Otherwise the program name is searched on the provider's PATH.
pub fn resolve_executable(ctx: &ExecutionContext, program: &Program) -> ExecResult<PathBuf> {
    if !program.path.is_empty() {
        let path = Path::new(&program.path);
        if path.is_relative() && path.components().count() > 1 {
            return Ok(ctx.current_dir().join(path));
        }
        return Ok(path.to_path_buf());
    }

    ctx.env
        .find_executable(&program.name)
        .ok_or_else(|| ExecError::ExecutableNotFound {
            program: program.name.clone(),
            name: program.name.clone(),
        })
}

/// Run `program` with runtime bindings, streaming stdout and stderr into `sink`.
///
/// `stdin` overrides `Program::stdin`; an empty payload gives the child no
/// input. A non-zero exit status is reported in the outcome, not as an error.
/// Cancelling the context terminates the child and returns
/// [`ExecError::Cancelled`].
#[instrument(skip_all, fields(program = %program.name, op_id = %ctx.operation_id))]
pub async fn run<W>(
    ctx: &ExecutionContext,
    program: &Program,
    values: &RuntimeValues,
    stdin: Option<&str>,
    sink: &mut W,
) -> ExecResult<RunOutcome>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    let start = Instant::now();
    let executable = resolve_executable(ctx, program)?;
    let args = compute_args(program, values)?;
    let payload = stdin.unwrap_or(&program.stdin).to_string();

    debug!(executable = %executable.display(), ?args, "spawning program");

    let mut cmd = Command::new(&executable);
    cmd.args(&args)
        .current_dir(ctx.current_dir())
        .env_clear()
        .envs(ctx.env.vars())
        .envs(&program.env)
        .stdin(if payload.is_empty() {
            Stdio::null()
        } else {
            Stdio::piped()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group, so cancellation reaches grandchildren too.
    #[cfg(unix)]
    {
        unsafe {
            cmd.pre_exec(|| {
                libc::setpgid(0, 0);
                Ok(())
            });
        }
    }

    let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
        program: program.name.clone(),
        path: executable.clone(),
        source,
    })?;

    let io_error = |source| ExecError::Io {
        program: program.name.clone(),
        source,
    };

    let mut cancellation = ctx.cancellation.clone();
    let work = drive(&mut child, payload, sink);
    let finished = tokio::select! {
        result = work => Some(result),
        _ = cancellation.cancelled() => None,
    };

    let Some(result) = finished else {
        warn!("cancelled, terminating child");
        terminate(&mut child, ctx.kill_grace).await;
        return Err(ExecError::Cancelled {
            program: program.name.clone(),
        });
    };

    let (status, captured) = result.map_err(io_error)?;
    let outcome = RunOutcome {
        exit_code: exit_code(status),
        stdout: String::from_utf8_lossy(&captured.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&captured.stderr).into_owned(),
        combined: String::from_utf8_lossy(&captured.combined).into_owned(),
        duration: start.elapsed(),
    };

    debug!(
        exit_code = outcome.exit_code,
        duration = ?outcome.duration,
        "program finished"
    );
    Ok(outcome)
}

/// Feed stdin, pump output and wait for exit.
async fn drive<W>(
    child: &mut Child,
    payload: String,
    sink: &mut W,
) -> io::Result<(ExitStatus, Captured)>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let feed = async move {
        if let Some(mut pipe) = stdin {
            match pipe.write_all(payload.as_bytes()).await {
                // The child may exit without reading everything.
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
                other => other?,
            }
        }
        Ok::<_, io::Error>(())
    };

    let (fed, captured) = tokio::join!(feed, pump(stdout, stderr, sink));
    fed?;
    let captured = captured?;
    let status = child.wait().await?;
    Ok((status, captured))
}

/// Read both pipes until EOF, forwarding every chunk to the sink as it arrives.
async fn pump<O, E, W>(stdout: Option<O>, stderr: Option<E>, sink: &mut W) -> io::Result<Captured>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    let mut captured = Captured::default();
    let mut out_buf = vec![0u8; READ_CHUNK];
    let mut err_buf = vec![0u8; READ_CHUNK];
    let mut stdout = stdout;
    let mut stderr = stderr;

    loop {
        let (out_open, err_open) = (stdout.is_some(), stderr.is_some());
        if !out_open && !err_open {
            break;
        }

        tokio::select! {
            read = read_some(&mut stdout, &mut out_buf), if out_open => {
                match read? {
                    0 => stdout = None,
                    n => {
                        sink.write_all(&out_buf[..n]).await?;
                        captured.stdout.extend_from_slice(&out_buf[..n]);
                        captured.combined.extend_from_slice(&out_buf[..n]);
                    }
                }
            }
            read = read_some(&mut stderr, &mut err_buf), if err_open => {
                match read? {
                    0 => stderr = None,
                    n => {
                        sink.write_all(&err_buf[..n]).await?;
                        captured.stderr.extend_from_slice(&err_buf[..n]);
                        captured.combined.extend_from_slice(&err_buf[..n]);
                    }
                }
            }
        }
    }

    sink.flush().await?;
    Ok(captured)
}

async fn read_some<R: AsyncRead + Unpin>(pipe: &mut Option<R>, buf: &mut [u8]) -> io::Result<usize> {
    match pipe {
        Some(pipe) => pipe.read(buf).await,
        None => Ok(0),
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Stop a cancelled child: SIGTERM to its process group, SIGKILL after the
/// grace period.
async fn terminate(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let group = Pid::from_raw(-(pid as i32));
            debug!(pid, "sending SIGTERM to process group");
            let _ = kill(group, Signal::SIGTERM);

            if tokio::time::timeout(grace, child.wait()).await.is_ok() {
                return;
            }

            debug!(pid, "sending SIGKILL to process group");
            let _ = kill(group, Signal::SIGKILL);
        }
    }

    let _ = child.kill().await;
}
