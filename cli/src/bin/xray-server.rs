//! Dashboard server host.
//!
//! Started by `xray open` with `XRAY_PORT`, `XRAY_UI_DIR` and
//! `XRAY_REPO_ROOT` in its environment. Prints `XRAY_SERVER_URL=<url>` once
//! listening and serves until SIGTERM or Ctrl-C.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use xray_launcher::{LaunchConfig, start_server};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = LaunchConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Invalid dashboard server environment: {}", e))?;

    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("Shutting down dashboard server...");
        cancel_for_signal.cancel();
    });

    start_server(config, cancel)
        .await
        .map_err(|e| anyhow::anyhow!("Dashboard server error: {}", e))?;
    Ok(())
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
