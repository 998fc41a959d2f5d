//! Execution context passed to the executor.

use crate::cancel::CancellationWatcher;
use crate::environment::{EnvironmentProvider, SystemEnvironment};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Grace period between SIGTERM and SIGKILL on cancellation.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// Everything an execution needs besides the program itself.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Environment provider.
    pub env: Arc<dyn EnvironmentProvider>,
    /// Cancellation of in-flight children.
    pub cancellation: CancellationWatcher,
    /// Overrides the provider's working directory.
    pub working_dir: Option<PathBuf>,
    /// Delay before a cancelled child is killed outright.
    pub kill_grace: Duration,
    /// Unique operation ID for logging.
    pub operation_id: String,
}

impl ExecutionContext {
    /// Create a context over an environment and a cancellation watcher.
    pub fn new(env: Arc<dyn EnvironmentProvider>, cancellation: CancellationWatcher) -> Self {
        Self {
            env,
            cancellation,
            working_dir: None,
            kill_grace: DEFAULT_KILL_GRACE,
            operation_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// The process environment, never cancelled.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemEnvironment), CancellationWatcher::never())
    }

    /// Run children in `dir`.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the SIGTERM to SIGKILL grace period.
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Working directory for children.
    pub fn current_dir(&self) -> PathBuf {
        self.working_dir
            .clone()
            .unwrap_or_else(|| self.env.current_dir())
    }
}
