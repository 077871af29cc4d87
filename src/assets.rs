//! Bundled asset resolution.
//!
//! Assets are located relative to the install root, never relative to the
//! working directory or the repository being inspected. The install root is
//! resolved once at startup (from the running executable, or an override)
//! and handed to the commands, so tests can point it at a temp directory.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::XrayError;

/// Name of the directory under the install root that holds every asset.
pub const ASSETS_DIR: &str = "assets";

/// Command that rebuilds the binaries of the asset bundle.
pub const REBUILD_COMMAND: &str = "cargo build --release -p xray-cli";

/// Entry document the UI directory must contain.
pub const UI_ENTRY_DOCUMENT: &str = "index.html";

/// Parent directories between the running executable and the install root
/// (`<root>/bin/xray`).
const EXE_DEPTH: usize = 2;

/// Logical names of the bundled assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// The dashboard server host binary
    Server,
    /// The static UI directory
    Ui,
    /// The analyzer artifact
    Engine,
}

impl AssetKind {
    /// Location relative to the assets directory.
    pub fn relative_path(self) -> PathBuf {
        match self {
            AssetKind::Server => Path::new("server")
                .join(format!("xray-server{}", std::env::consts::EXE_SUFFIX)),
            AssetKind::Ui => PathBuf::from("ui"),
            AssetKind::Engine => PathBuf::from("xray-engine.jar"),
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AssetKind::Server => "Server bundle",
            AssetKind::Ui => "UI assets",
            AssetKind::Engine => "Engine jar",
        };
        f.write_str(label)
    }
}

impl FromStr for AssetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "server" => Ok(AssetKind::Server),
            "ui" => Ok(AssetKind::Ui),
            "engine" => Ok(AssetKind::Engine),
            other => Err(format!("unknown asset '{}'", other)),
        }
    }
}

/// Resolved install root of the launcher package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRoot {
    root: PathBuf,
}

impl InstallRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Derive the install root from an executable path by walking up
    /// [`EXE_DEPTH`] parents. Falls back to the filesystem root when the path
    /// is too shallow.
    pub fn from_exe_path(exe: &Path) -> Self {
        let root = exe
            .ancestors()
            .nth(EXE_DEPTH)
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(std::path::MAIN_SEPARATOR_STR));
        Self { root }
    }

    /// Derive the install root from the running executable.
    pub fn from_current_exe() -> crate::Result<Self> {
        let exe = std::env::current_exe()
            .and_then(|p| p.canonicalize())
            .map_err(|e| XrayError::io("failed to locate the running executable", e))?;
        Ok(Self::from_exe_path(&exe))
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join(ASSETS_DIR)
    }

    /// Pure path arithmetic; never touches the filesystem.
    pub fn resolve(&self, kind: AssetKind) -> PathBuf {
        self.assets_dir().join(kind.relative_path())
    }

    /// Resolve by logical name (`server`, `ui`, `engine`).
    pub fn resolve_named(&self, name: &str) -> crate::Result<PathBuf> {
        let kind = name.parse::<AssetKind>().map_err(XrayError::InvalidConfig)?;
        Ok(self.resolve(kind))
    }

    /// Resolve an asset and check that it is present.
    ///
    /// The UI directory counts as present only when it holds the entry
    /// document.
    pub fn require(&self, kind: AssetKind) -> crate::Result<PathBuf> {
        let path = self.resolve(kind);
        let present = match kind {
            AssetKind::Ui => path.join(UI_ENTRY_DOCUMENT).is_file(),
            AssetKind::Server | AssetKind::Engine => path.is_file(),
        };
        if present {
            Ok(path)
        } else {
            tracing::debug!(asset = %kind, path = %path.display(), "asset missing");
            Err(XrayError::MissingAsset { kind, path })
        }
    }
}
