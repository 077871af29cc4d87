//! Streaming child runs: output is relayed to the parent's streams as it is
//! produced, and the exit status is reported once the child is gone.
//!
//! On Unix each child gets its own process group, so [`StreamingChild`] can
//! stop the child together with anything it forked. The parent owns signal
//! handling and forwards termination explicitly (see [`super::supervise`]).

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::XrayError;
use crate::process::{ChildExit, CommandSpec, ProcessHandle, supervise};

/// How long to keep draining output after the child exits. Bounds the wait
/// when an orphaned grandchild still holds the pipes open.
const RELAY_GRACE: Duration = Duration::from_secs(2);

const RELAY_CHUNK: usize = 8 * 1024;

/// Copy `from` into `to` chunk by chunk, flushing after every chunk.
///
/// Returns the number of bytes relayed once `from` reaches EOF.
pub async fn relay<R, W>(mut from: R, mut to: W) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; RELAY_CHUNK];
    let mut total = 0u64;
    loop {
        let n = from.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        to.write_all(&buf[..n]).await?;
        to.flush().await?;
        total += n as u64;
    }
    Ok(total)
}

/// A running child whose stdout/stderr are relayed live.
pub struct StreamingChild {
    program: String,
    child: Child,
    relays: Vec<JoinHandle<std::io::Result<u64>>>,
}

impl StreamingChild {
    /// Spawn `spec`, relaying its output to this process's stdout and stderr.
    pub fn spawn(spec: &CommandSpec) -> crate::Result<Self> {
        Self::spawn_with_sinks(spec, tokio::io::stdout(), tokio::io::stderr())
    }

    /// Spawn `spec`, relaying its stdout into `out` and its stderr into `err`.
    pub fn spawn_with_sinks<O, E>(spec: &CommandSpec, out: O, err: E) -> crate::Result<Self>
    where
        O: AsyncWrite + Send + Unpin + 'static,
        E: AsyncWrite + Send + Unpin + 'static,
    {
        let program = spec.display_program();
        let mut cmd = spec.to_command();
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // Covers early returns; the normal path waits for the child.
        cmd.kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| XrayError::Spawn {
            command: program.clone(),
            source: e,
        })?;

        let mut relays = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            relays.push(tokio::spawn(relay(stdout, out)));
        }
        if let Some(stderr) = child.stderr.take() {
            relays.push(tokio::spawn(relay(stderr, err)));
        }

        tracing::info!(program = %program, pid = ?child.id(), "spawned child process");

        Ok(Self {
            program,
            child,
            relays,
        })
    }

    /// OS process id, while the child is still running.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait_and_drain(&mut self) -> ChildExit {
        let exit = match self.child.wait().await {
            Ok(status) => ChildExit::from(status),
            Err(e) => {
                tracing::error!(program = %self.program, error = %e, "failed to wait for child");
                ChildExit::Exited(1)
            }
        };

        let relays = std::mem::take(&mut self.relays);
        match tokio::time::timeout(RELAY_GRACE, futures::future::join_all(relays)).await {
            Ok(results) => {
                for result in results {
                    match result {
                        Ok(Ok(bytes)) => tracing::debug!(program = %self.program, bytes, "relay drained"),
                        Ok(Err(e)) => tracing::debug!(program = %self.program, error = %e, "relay stopped"),
                        Err(e) => tracing::debug!(program = %self.program, error = %e, "relay task failed"),
                    }
                }
            }
            Err(_) => {
                tracing::warn!(program = %self.program, "child output still open after exit, not waiting further");
            }
        }

        exit
    }
}

impl ProcessHandle for StreamingChild {
    fn wait_for_exit(&mut self) -> impl std::future::Future<Output = ChildExit> + Send {
        self.wait_and_drain()
    }

    fn terminate(&mut self) {
        #[cfg(unix)]
        {
            if self.signal_group(libc::SIGTERM) {
                return;
            }
        }
        self.start_kill();
    }

    fn kill(&mut self) {
        #[cfg(unix)]
        {
            self.signal_group(libc::SIGKILL);
        }
        // The direct child may have left the group; make sure it dies too.
        self.start_kill();
    }
}

impl StreamingChild {
    /// Send `signal` to the child's process group. Returns false when the
    /// signal could not be delivered.
    #[cfg(unix)]
    fn signal_group(&self, signal: libc::c_int) -> bool {
        let Some(pgid) = self.child.id().and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
            return false;
        };
        // SAFETY: kill(2) with a negative pid only signals the group; it does not
        // touch memory owned by this process.
        let rc = unsafe { libc::kill(-pgid, signal) };
        if rc != 0 {
            tracing::debug!(program = %self.program, signal, "process group signal not delivered");
        }
        rc == 0
    }

    fn start_kill(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(program = %self.program, error = %e, "kill failed, child already gone");
        }
    }
}

/// Spawn `spec`, relay its output, and wait for it to exit, terminating it
/// if `cancel` fires first.
///
/// Never fails: a spawn failure yields [`ChildExit::SpawnFailed`].
pub async fn run_streaming(spec: &CommandSpec, cancel: CancellationToken) -> ChildExit {
    match StreamingChild::spawn(spec) {
        Ok(child) => supervise(child, cancel).await,
        Err(e) => {
            tracing::debug!(error = %e, "streaming run failed to spawn");
            ChildExit::SpawnFailed(e.to_string())
        }
    }
}
