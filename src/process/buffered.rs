//! Buffered child runs for short diagnostic commands.

use std::ffi::OsStr;
use std::process::Stdio;

use crate::process::{ChildExit, RunResult};

/// Run `program` with `args`, collecting stdout and stderr into memory.
///
/// Never fails: a program that cannot be spawned yields a `RunResult` whose
/// exit is [`ChildExit::SpawnFailed`] and whose output is empty.
pub async fn run_buffered<I, S>(program: impl AsRef<OsStr>, args: I) -> RunResult
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let program = program.as_ref();
    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    match cmd.output().await {
        Ok(output) => {
            let result = RunResult {
                exit: ChildExit::from(output.status),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            };
            tracing::debug!(
                program = %program.to_string_lossy(),
                exit_code = %result.exit_code(),
                "buffered run finished"
            );
            result
        }
        Err(e) => {
            tracing::debug!(
                program = %program.to_string_lossy(),
                error = %e,
                "buffered run failed to spawn"
            );
            RunResult {
                exit: ChildExit::SpawnFailed(e.to_string()),
                stdout: String::new(),
                stderr: String::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::SPAWN_FAILURE_EXIT_CODE;

    #[tokio::test]
    async fn test_missing_executable_maps_to_sentinel() {
        let result = run_buffered("definitely-not-an-executable-xyz", Vec::<String>::new()).await;
        assert!(matches!(result.exit, ChildExit::SpawnFailed(_)));
        assert_eq!(result.exit_code(), SPAWN_FAILURE_EXIT_CODE);
        assert!(result.stdout.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_stdout_and_stderr() {
        let result = run_buffered("sh", ["-c", "echo out; echo err >&2"]).await;
        assert!(result.success());
        assert_eq!(result.stdout.trim(), "out");
        assert_eq!(result.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_code_is_reported() {
        let result = run_buffered("sh", ["-c", "exit 7"]).await;
        assert_eq!(result.exit, ChildExit::Exited(7));
        assert!(!result.success());
    }
}
