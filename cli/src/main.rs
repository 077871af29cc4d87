//! X-Ray: local repository dashboard and analyzer launcher.
//!
//! Three subcommands:
//! - `xray doctor`: check the Java runtime and the bundled assets
//! - `xray open [path]`: serve the dashboard for a repository and open it in a browser
//! - `xray analyze [path]`: run the analysis engine, writing artifacts to `<path>/.xray`

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use xray_launcher::{LauncherConfig, OpenOptions, XrayError, analyze, doctor, open_dashboard};

/// X-Ray: local repository dashboard and analyzer launcher.
#[derive(Parser)]
#[command(
    name = "xray",
    version,
    about = "X-Ray: local repository dashboard and analyzer launcher"
)]
struct Cli {
    /// Path to xray.toml [default: ~/.config/xray/xray.toml if present]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the Java runtime and the bundled assets are in place
    Doctor,
    /// Start the dashboard for a repository and open it in the browser
    Open {
        /// Repository to inspect
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Print the dashboard URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// Run the analysis engine over a repository
    Analyze {
        /// Repository to analyze
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with env filter (RUST_LOG controls verbosity)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let code = match run(cli, cancel).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e);
            e.exit_code()
        }
    };

    std::process::exit(code);
}

async fn run(cli: Cli, cancel: CancellationToken) -> Result<i32, XrayError> {
    let config = resolve_config(cli.config).await?;

    match cli.command {
        Commands::Doctor => doctor(&config).await,
        Commands::Open { path, no_browser } => {
            let mut options = OpenOptions::from_config(&config);
            if no_browser {
                options.open_browser = false;
            }
            open_dashboard(&config, &path, options, cancel).await
        }
        Commands::Analyze { path } => analyze(&config, &path, cancel).await,
    }
}

/// Cancel the root token on Ctrl-C or SIGTERM. Running children are stopped
/// through their process group by whoever supervises them.
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("Shutting down X-Ray...");
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to install SIGTERM handler");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
}

/// Resolve configuration: explicit flag → ~/.config/xray/xray.toml → defaults,
/// then apply `XRAY_HOME` / `XRAY_JAVA` from the environment.
async fn resolve_config(explicit: Option<PathBuf>) -> Result<LauncherConfig, XrayError> {
    let config = match explicit {
        Some(path) => LauncherConfig::load(&path).await?,
        None => match dirs::config_dir()
            .map(|dir| dir.join("xray").join("xray.toml"))
            .filter(|path| path.exists())
        {
            Some(path) => {
                tracing::debug!(path = %path.display(), "using user config");
                LauncherConfig::load(&path).await?
            }
            None => LauncherConfig::default(),
        },
    };
    Ok(config.apply_env(|key| std::env::var(key).ok()))
}
