//! Foreground invocation of the external analysis engine.
//!
//! The engine is an opaque jar run as
//! `<java> -jar <engine> --input <repoRoot> --out <outDir>`. It owns the
//! contents of the output directory; the launcher only creates it.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::assets::{AssetKind, InstallRoot};
use crate::error::XrayError;
use crate::process::{ChildExit, CommandSpec, run_streaming};
use crate::runtime::JavaRuntime;

/// Name of the output directory created under the repository root.
pub const OUTPUT_DIR_NAME: &str = ".xray";

/// Remediation shown when the Java runtime is missing.
pub const RUNTIME_HINT: &str = "Run: xray doctor";

/// Output directory for a repository root.
pub fn output_dir(repo_root: &Path) -> PathBuf {
    repo_root.join(OUTPUT_DIR_NAME)
}

/// Create `out_dir` and its parents if absent.
pub async fn ensure_output_dir(out_dir: &Path) -> crate::Result<()> {
    tokio::fs::create_dir_all(out_dir).await.map_err(|e| {
        XrayError::io(
            format!("failed to create output directory {}", out_dir.display()),
            e,
        )
    })
}

/// Command line that runs the engine jar against `repo_root`.
pub fn analyzer_command(
    runtime: &JavaRuntime,
    engine_jar: &Path,
    repo_root: &Path,
    out_dir: &Path,
) -> CommandSpec {
    CommandSpec::new(runtime.command())
        .arg("-jar")
        .arg(engine_jar)
        .arg("--input")
        .arg(repo_root)
        .arg("--out")
        .arg(out_dir)
}

/// Create the output directory and check the analyzer's preconditions.
///
/// The output directory is created first, before either precondition is
/// checked. A missing runtime or a missing engine jar is reported before
/// anything is spawned. Returns the command line to run.
pub async fn prepare_analyzer(
    runtime: &JavaRuntime,
    install_root: &InstallRoot,
    repo_root: &Path,
    out_dir: &Path,
) -> crate::Result<CommandSpec> {
    ensure_output_dir(out_dir).await?;

    runtime.require(RUNTIME_HINT).await?;
    let engine_jar = install_root.require(AssetKind::Engine)?;

    Ok(analyzer_command(runtime, &engine_jar, repo_root, out_dir))
}

/// Run the analyzer in the foreground and report how it exited.
///
/// `cancel` terminates a running analyzer.
pub async fn invoke_analyzer(
    runtime: &JavaRuntime,
    install_root: &InstallRoot,
    repo_root: &Path,
    out_dir: &Path,
    cancel: CancellationToken,
) -> crate::Result<ChildExit> {
    let spec = prepare_analyzer(runtime, install_root, repo_root, out_dir).await?;
    tracing::info!(
        program = %spec.display_program(),
        repo_root = %repo_root.display(),
        out_dir = %out_dir.display(),
        "invoking analyzer"
    );
    Ok(run_streaming(&spec, cancel).await)
}
