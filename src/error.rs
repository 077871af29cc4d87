//! Error types for X-Ray launcher operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::assets::AssetKind;

/// Main error type for launcher operations.
///
/// Every variant is fatal for the command that produced it. Child process
/// exit codes are not errors; they travel as [`crate::process::ChildExit`].
#[derive(Error, Debug)]
pub enum XrayError {
    /// Required external runtime is absent or not runnable
    #[error("{runtime} runtime not found. {hint}")]
    MissingRuntime { runtime: String, hint: String },

    /// Bundled asset is absent from the install root
    #[error(
        "{kind} not found: {path}. Rebuild the asset bundle and reinstall xray. Run: {}",
        crate::assets::REBUILD_COMMAND
    )]
    MissingAsset { kind: AssetKind, path: PathBuf },

    /// The OS refused an ephemeral bind or returned no port
    #[error("could not allocate a free port: {0}")]
    PortAllocation(#[source] std::io::Error),

    /// Executable could not be started
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Dashboard server could not bind its listening socket
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Required environment variable missing or malformed
    #[error("invalid environment variable {var}: {reason}")]
    InvalidEnv { var: String, reason: String },

    /// Launcher config file is unreadable or invalid
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Filesystem operation failed
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// HTTP server failed after it started listening
    #[error("dashboard server error: {0}")]
    Server(String),
}

impl XrayError {
    /// Process exit code for this error at the command boundary.
    pub fn exit_code(&self) -> i32 {
        1
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        XrayError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result type alias for launcher operations
pub type Result<T> = std::result::Result<T, XrayError>;
