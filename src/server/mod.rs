//! Dashboard server: a single loopback HTTP listener serving the UI and the
//! metadata endpoint.
//!
//! The lifecycle is encoded in the types. [`DashboardServer::bind`] is the
//! only way to obtain a server, so holding one means it is listening;
//! [`DashboardServer::serve`] consumes it and returns once it has terminated.
//! There is no reconfiguration in between.

pub mod http;

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::LaunchConfig;
use crate::error::XrayError;

/// Line prefix the server prints on stdout once it is listening.
pub const SERVER_URL_PREFIX: &str = "XRAY_SERVER_URL=";

/// A dashboard server that is bound and listening.
pub struct DashboardServer {
    config: Arc<LaunchConfig>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl DashboardServer {
    /// Bind 127.0.0.1 on the configured port.
    ///
    /// A port that is already taken is a startup error; the server never moves
    /// to another port on its own.
    pub async fn bind(config: LaunchConfig) -> crate::Result<Self> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, config.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| XrayError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| XrayError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;

        tracing::info!(
            addr = %local_addr,
            ui_dir = %config.ui_dir.display(),
            repo_root = %config.repo_root.display(),
            "dashboard server listening"
        );

        Ok(Self {
            config: Arc::new(config),
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    /// Serve requests until `cancel` fires.
    pub async fn serve(self, cancel: CancellationToken) -> crate::Result<()> {
        let app = http::router(self.config);
        axum::serve(self.listener, app)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await
            .map_err(|e| XrayError::Server(e.to_string()))?;

        tracing::info!(addr = %self.local_addr, "dashboard server stopped");
        Ok(())
    }
}

/// Bind, announce the URL on stdout, and serve until `cancel` fires.
pub async fn start_server(config: LaunchConfig, cancel: CancellationToken) -> crate::Result<()> {
    let server = DashboardServer::bind(config).await?;
    println!("{}{}", SERVER_URL_PREFIX, server.url());
    server.serve(cancel).await
}
