//! Child process launching.
//!
//! Two modes share one result model:
//! - [`buffered::run_buffered`] collects stdout/stderr for short probe commands.
//! - [`streaming::StreamingChild`] relays output live for the dashboard server
//!   and the analyzer.
//!
//! Spawn failures never surface as errors from the run functions. They are
//! reported as [`ChildExit::SpawnFailed`] and map to
//! [`SPAWN_FAILURE_EXIT_CODE`] at the process-exit boundary.

pub mod buffered;
pub mod streaming;

use std::ffi::OsString;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub use buffered::run_buffered;
pub use streaming::{StreamingChild, run_streaming};

/// Exit code reported when a child could not be started at all.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

/// How long a terminated child gets to exit before it is killed.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// How a child process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildExit {
    /// Exited normally with a code
    Exited(i32),
    /// Terminated without an exit code (e.g. killed by a signal)
    Signaled,
    /// Never started
    SpawnFailed(String),
}

impl ChildExit {
    /// Integer exit code for this outcome. A signal death has no code of its
    /// own and maps to 0.
    pub fn exit_code(&self) -> i32 {
        match self {
            ChildExit::Exited(code) => *code,
            ChildExit::Signaled => 0,
            ChildExit::SpawnFailed(_) => SPAWN_FAILURE_EXIT_CODE,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self, ChildExit::Exited(0))
    }
}

impl From<std::process::ExitStatus> for ChildExit {
    fn from(status: std::process::ExitStatus) -> Self {
        match status.code() {
            Some(code) => ChildExit::Exited(code),
            None => ChildExit::Signaled,
        }
    }
}

/// Outcome of a buffered child run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub exit: ChildExit,
    pub stdout: String,
    pub stderr: String,
}

impl RunResult {
    pub fn exit_code(&self) -> i32 {
        self.exit.exit_code()
    }

    pub fn success(&self) -> bool {
        self.exit.success()
    }
}

/// Program, arguments and environment overlay for a child process.
///
/// The child inherits the parent's environment; `env` entries are layered on
/// top of it.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub env: Vec<(OsString, OsString)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Program name for logs and error messages.
    pub fn display_program(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    fn to_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        cmd.envs(self.env.iter().map(|(k, v)| (k, v)));
        cmd.stdin(Stdio::null());
        cmd
    }
}

/// Lifecycle handle for a running child process.
pub trait ProcessHandle {
    /// Wait until the child has exited and its output has been relayed.
    fn wait_for_exit(&mut self) -> impl Future<Output = ChildExit> + Send;

    /// Ask the child (and anything it started) to stop. Does not wait.
    fn terminate(&mut self);

    /// Force the child (and anything it started) to stop. Does not wait.
    fn kill(&mut self);
}

/// Wait for the child to exit.
///
/// When `cancel` fires first (Ctrl-C, SIGTERM), the child is terminated and
/// still waited for, so the caller never exits with a live child behind it.
/// A child still running [`TERMINATE_GRACE`] after termination is killed.
/// A single child death is final: nothing is restarted. Callers link their
/// own exit code to the child's with [`ChildExit::exit_code`].
pub async fn supervise<H: ProcessHandle>(handle: H, cancel: CancellationToken) -> ChildExit {
    supervise_with_grace(handle, cancel, TERMINATE_GRACE).await
}

/// [`supervise`] with an explicit termination grace period.
pub async fn supervise_with_grace<H: ProcessHandle>(
    mut handle: H,
    cancel: CancellationToken,
    grace: Duration,
) -> ChildExit {
    let exit = tokio::select! {
        exit = handle.wait_for_exit() => exit,
        _ = cancel.cancelled() => {
            tracing::info!("shutdown requested, terminating child process");
            handle.terminate();
            match tokio::time::timeout(grace, handle.wait_for_exit()).await {
                Ok(exit) => exit,
                Err(_) => {
                    tracing::warn!(
                        grace_ms = grace.as_millis() as u64,
                        "child ignored termination, killing it"
                    );
                    handle.kill();
                    handle.wait_for_exit().await
                }
            }
        }
    };

    tracing::info!(exit = ?exit, "child process exited");
    exit
}
