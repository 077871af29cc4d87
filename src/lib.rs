//! X-Ray launcher: starts the local dashboard server, runs the Java analysis
//! engine against a repository, and checks that the runtime and bundled
//! assets are in place.
//!
//! The `xray` and `xray-server` binaries live in the `cli` crate; everything
//! they do is implemented here.

pub mod analyzer;
pub mod assets;
pub mod config;
pub mod error;
pub mod launcher;
pub mod ports;
pub mod process;
pub mod runtime;
pub mod server;

pub use analyzer::{invoke_analyzer, prepare_analyzer};
pub use assets::{AssetKind, InstallRoot};
pub use config::{LaunchConfig, LauncherConfig};
pub use error::{Result, XrayError};
pub use launcher::{OpenOptions, analyze, doctor, open_dashboard};
pub use ports::allocate_free_port;
pub use process::{
    ChildExit, CommandSpec, RunResult, run_buffered, run_streaming, supervise,
    supervise_with_grace,
};
pub use runtime::{JavaRuntime, RuntimeInfo};
pub use server::{DashboardServer, start_server};
