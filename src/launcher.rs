//! Command handlers behind `xray doctor`, `xray open` and `xray analyze`.
//!
//! Each handler returns the exit code the `xray` process should finish with.
//! Fatal conditions come back as `Err` and map to exit code 1; a child's
//! exit code is passed through unchanged.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::analyzer::{output_dir, prepare_analyzer};
use crate::assets::AssetKind;
use crate::config::{LaunchConfig, LauncherConfig};
use crate::error::XrayError;
use crate::ports::allocate_free_port;
use crate::process::{ChildExit, CommandSpec, StreamingChild, run_streaming, supervise};

/// Delay between readiness polls of a starting dashboard server.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Options for `xray open`.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub open_browser: bool,
    pub ready_timeout: Duration,
}

impl OpenOptions {
    pub fn from_config(config: &LauncherConfig) -> Self {
        Self {
            open_browser: config.dashboard.open_browser,
            ready_timeout: Duration::from_secs(config.dashboard.ready_timeout_secs),
        }
    }
}

/// Turn the user-supplied repository path into an absolute, existing path.
pub fn resolve_repo_root(path: &Path) -> crate::Result<PathBuf> {
    path.canonicalize()
        .map_err(|e| XrayError::io(format!("repository path {}", path.display()), e))
}

/// `xray doctor`: report the runtime and asset situation.
///
/// Returns 1 when the Java runtime is missing; missing assets are reported
/// but do not fail the check.
pub async fn doctor(config: &LauncherConfig) -> crate::Result<i32> {
    println!("xray doctor");
    println!("xray: {}", env!("CARGO_PKG_VERSION"));

    match config.install_root() {
        Ok(root) => {
            println!("assets: {}", root.assets_dir().display());
            for kind in [AssetKind::Server, AssetKind::Ui, AssetKind::Engine] {
                if let Err(e) = root.require(kind) {
                    println!("  missing: {}", e);
                }
            }
        }
        Err(e) => println!("assets: unresolved ({})", e),
    }

    let runtime = config.java();
    match runtime.require(crate::analyzer::RUNTIME_HINT).await {
        Ok(info) => {
            println!("java: {}", info.version_line);
            if info.is_outdated() {
                eprintln!(
                    "warning: Java {} detected; the analyzer needs Java {}+",
                    info.major.unwrap_or_default(),
                    crate::runtime::MIN_JAVA_MAJOR
                );
            }
            println!("\nOK");
            Ok(0)
        }
        Err(XrayError::MissingRuntime { .. }) => {
            eprintln!("\nJava runtime not found.");
            eprintln!(
                "Install Java {}+ and ensure `{}` is on PATH.",
                crate::runtime::MIN_JAVA_MAJOR,
                runtime.command()
            );
            Ok(1)
        }
        Err(e) => Err(e),
    }
}

/// `xray open`: start the dashboard server for `repo_path` and stay attached
/// to it until it exits.
///
/// Asset checks happen before any port is allocated or process spawned.
pub async fn open_dashboard(
    config: &LauncherConfig,
    repo_path: &Path,
    options: OpenOptions,
    cancel: CancellationToken,
) -> crate::Result<i32> {
    let repo_root = resolve_repo_root(repo_path)?;
    let install_root = config.install_root()?;
    let server_bin = install_root.require(AssetKind::Server)?;
    let ui_dir = install_root.require(AssetKind::Ui)?;

    let port = allocate_free_port().await?;
    let launch = LaunchConfig::new(port, ui_dir, repo_root);
    let spec = server_command(&server_bin, &launch);

    let child = match StreamingChild::spawn(&spec) {
        Ok(child) => child,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(ChildExit::SpawnFailed(e.to_string()).exit_code());
        }
    };

    let url = format!("http://127.0.0.1:{}", port);
    if options.open_browser {
        tokio::spawn(open_browser_when_ready(
            url,
            options.ready_timeout,
            cancel.child_token(),
        ));
    } else {
        println!("Dashboard: {}", url);
    }

    Ok(supervise(child, cancel).await.exit_code())
}

/// Command line for the dashboard server child.
pub fn server_command(server_bin: &Path, launch: &LaunchConfig) -> CommandSpec {
    launch
        .to_env()
        .into_iter()
        .fold(CommandSpec::new(server_bin), |spec, (key, value)| {
            spec.env(key, value)
        })
}

/// Poll `GET {base_url}/api/meta` until it answers 200 or `timeout` elapses.
pub async fn wait_until_ready(base_url: &str, timeout: Duration) -> bool {
    let client = match reqwest::Client::builder()
        .no_proxy()
        .timeout(READY_POLL_INTERVAL * 10)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "failed to build readiness client");
            return false;
        }
    };

    let meta_url = format!("{}/api/meta", base_url);
    let deadline = Instant::now() + timeout;
    loop {
        match client.get(&meta_url).send().await {
            Ok(resp) if resp.status().is_success() => return true,
            Ok(resp) => tracing::debug!(status = %resp.status(), "dashboard not ready yet"),
            Err(e) => tracing::debug!(error = %e, "dashboard not reachable yet"),
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(READY_POLL_INTERVAL).await;
    }
}

async fn open_browser_when_ready(url: String, timeout: Duration, cancel: CancellationToken) {
    let ready = tokio::select! {
        ready = wait_until_ready(&url, timeout) => ready,
        _ = cancel.cancelled() => return,
    };
    if !ready {
        tracing::warn!(url = %url, timeout_secs = timeout.as_secs(), "dashboard did not become ready, opening browser anyway");
    }

    let target = url.clone();
    match tokio::task::spawn_blocking(move || open::that(&target)).await {
        Ok(Ok(())) => tracing::info!(url = %url, "opened browser"),
        Ok(Err(e)) => {
            tracing::warn!(url = %url, error = %e, "failed to open browser");
            eprintln!("Open {} in your browser.", url);
        }
        Err(e) => tracing::warn!(error = %e, "browser launch task failed"),
    }
}

/// `xray analyze`: run the analyzer over `repo_path` and pass its exit code
/// through.
pub async fn analyze(
    config: &LauncherConfig,
    repo_path: &Path,
    cancel: CancellationToken,
) -> crate::Result<i32> {
    let repo_root = resolve_repo_root(repo_path)?;
    let out_dir = output_dir(&repo_root);
    let install_root = config.install_root()?;
    let runtime = config.java();

    let spec = prepare_analyzer(&runtime, &install_root, &repo_root, &out_dir).await?;

    println!("Analyzing repo: {}", repo_root.display());
    println!("Output dir: {}", out_dir.display());

    let exit = run_streaming(&spec, cancel).await;
    let code = exit.exit_code();
    match exit {
        ChildExit::Exited(0) => println!("Done. Artifacts in: {}", out_dir.display()),
        ChildExit::Signaled => eprintln!("Analyzer was terminated by a signal."),
        ChildExit::Exited(code) => eprintln!("Analyzer failed (exit code {}).", code),
        ChildExit::SpawnFailed(reason) => {
            eprintln!("Analyzer failed to start: {}", reason);
        }
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{InstallRoot, UI_ENTRY_DOCUMENT};
    use crate::server::DashboardServer;

    fn config_with_root(root: &Path) -> LauncherConfig {
        let mut config = LauncherConfig::default();
        config.assets.root = Some(root.to_path_buf());
        config
    }

    fn quiet_options() -> OpenOptions {
        OpenOptions {
            open_browser: false,
            ready_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_server_command_carries_launch_env() {
        let launch = LaunchConfig::new(4321, "/opt/xray/assets/ui", "/work/repo");
        let spec = server_command(Path::new("/opt/xray/assets/server/xray-server"), &launch);
        assert!(spec.args.is_empty());
        let env: Vec<(String, String)> = spec
            .env
            .iter()
            .map(|(k, v)| (k.to_string_lossy().into_owned(), v.to_string_lossy().into_owned()))
            .collect();
        assert!(env.contains(&("XRAY_PORT".to_string(), "4321".to_string())));
        assert!(env.contains(&("XRAY_UI_DIR".to_string(), "/opt/xray/assets/ui".to_string())));
        assert!(env.contains(&("XRAY_REPO_ROOT".to_string(), "/work/repo".to_string())));
    }

    #[test]
    fn test_resolve_repo_root_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let result = resolve_repo_root(&dir.path().join("nope"));
        assert!(matches!(result, Err(XrayError::Io { .. })));
    }

    #[test]
    fn test_resolve_repo_root_is_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let root = resolve_repo_root(dir.path()).unwrap();
        assert!(root.is_absolute());
    }

    #[tokio::test]
    async fn test_open_without_server_bundle_fails_before_spawning() {
        let install = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        let result = open_dashboard(
            &config_with_root(install.path()),
            repo.path(),
            quiet_options(),
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(
            result,
            Err(XrayError::MissingAsset { kind: AssetKind::Server, .. })
        ));
    }

    #[tokio::test]
    async fn test_open_without_ui_fails_before_spawning() {
        let install = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(install.path());
        let server = root.resolve(AssetKind::Server);
        std::fs::create_dir_all(server.parent().unwrap()).unwrap();
        std::fs::write(&server, b"").unwrap();
        let repo = tempfile::tempdir().unwrap();

        let err = open_dashboard(
            &config_with_root(install.path()),
            repo.path(),
            quiet_options(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, XrayError::MissingAsset { kind: AssetKind::Ui, .. }));
        assert!(err.to_string().contains("Rebuild"));
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_wait_until_ready_against_live_server() {
        let ui = tempfile::tempdir().unwrap();
        std::fs::write(ui.path().join(UI_ENTRY_DOCUMENT), "<html></html>").unwrap();
        let server = DashboardServer::bind(LaunchConfig::new(0, ui.path(), "/repo"))
            .await
            .unwrap();
        let url = server.url();
        let cancel = CancellationToken::new();
        tokio::spawn(server.serve(cancel.clone()));

        assert!(wait_until_ready(&url, Duration::from_secs(5)).await);
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_wait_until_ready_times_out() {
        let port = allocate_free_port().await.unwrap();
        let url = format!("http://127.0.0.1:{}", port);
        assert!(!wait_until_ready(&url, Duration::from_millis(300)).await);
    }

    #[tokio::test]
    async fn test_analyze_missing_runtime_creates_output_dir() {
        let install = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        let mut config = config_with_root(install.path());
        config.runtime.java = "definitely-not-a-java-xyz".to_string();

        let result = analyze(&config, repo.path(), CancellationToken::new()).await;
        assert!(matches!(result, Err(XrayError::MissingRuntime { .. })));
        assert!(repo.path().join(".xray").is_dir());
    }

    #[tokio::test]
    async fn test_doctor_missing_runtime_exits_one() {
        let install = tempfile::tempdir().unwrap();
        let mut config = config_with_root(install.path());
        config.runtime.java = "definitely-not-a-java-xyz".to_string();
        assert_eq!(doctor(&config).await.unwrap(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_open_passes_server_exit_code_and_env_through() {
        use std::os::unix::fs::PermissionsExt;

        let install = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(install.path());
        let ui = root.resolve(AssetKind::Ui);
        std::fs::create_dir_all(&ui).unwrap();
        std::fs::write(ui.join(UI_ENTRY_DOCUMENT), "<html></html>").unwrap();

        let record = install.path().join("env.txt");
        let server = root.resolve(AssetKind::Server);
        std::fs::create_dir_all(server.parent().unwrap()).unwrap();
        std::fs::write(
            &server,
            format!(
                "#!/bin/sh\n\
                 printf '%s\\n%s\\n%s\\n' \"$XRAY_PORT\" \"$XRAY_UI_DIR\" \"$XRAY_REPO_ROOT\" > \"{}\"\n\
                 exit 4\n",
                record.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&server, std::fs::Permissions::from_mode(0o755)).unwrap();
        let repo = tempfile::tempdir().unwrap();

        let code = open_dashboard(
            &config_with_root(install.path()),
            repo.path(),
            quiet_options(),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(code, 4);

        let recorded = std::fs::read_to_string(&record).unwrap();
        let lines: Vec<&str> = recorded.lines().collect();
        assert_eq!(lines.len(), 3, "recorded env: {:?}", recorded);
        assert!(lines[0].parse::<u16>().unwrap() > 0);
        assert_eq!(lines[1], ui.to_string_lossy());
        assert_eq!(
            lines[2],
            repo.path().canonicalize().unwrap().to_string_lossy()
        );
    }
}
