//! External runtime probing.
//!
//! The analyzer needs a Java runtime. Probing runs `<java> -version` through
//! the buffered launcher; a missing executable shows up as a failed
//! [`RunResult`], never as an error.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::XrayError;
use crate::process::{RunResult, run_buffered};

/// Argument every JVM understands for printing its version.
pub const VERSION_ARG: &str = "-version";

/// Oldest Java major version the analyzer is built for.
pub const MIN_JAVA_MAJOR: u32 = 17;

static JAVA_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"version\s+"(\d+)(?:\.(\d+))?"#).expect("java version regex is valid")
});

/// Invoke `executable` with the version-query argument and capture its output.
pub async fn probe(executable: &str) -> RunResult {
    run_buffered(executable, [VERSION_ARG]).await
}

/// First non-empty line of the probe output. JVMs print their version to
/// stderr, so stderr wins when both are present.
pub fn version_line(result: &RunResult) -> Option<String> {
    [&result.stderr, &result.stdout]
        .into_iter()
        .filter_map(|text| text.lines().map(str::trim).find(|l| !l.is_empty()))
        .map(str::to_string)
        .next()
}

/// Parse the major version out of a `java -version` line.
///
/// Handles both the legacy `1.x` scheme (`"1.8.0_292"` → 8) and the modern
/// one (`"17.0.2"` → 17, `"21"` → 21).
pub fn parse_java_major(line: &str) -> Option<u32> {
    let caps = JAVA_VERSION.captures(line)?;
    let first: u32 = caps.get(1)?.as_str().parse().ok()?;
    if first == 1 {
        caps.get(2).and_then(|m| m.as_str().parse().ok())
    } else {
        Some(first)
    }
}

/// Details of a runtime that answered the probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInfo {
    pub version_line: String,
    pub major: Option<u32>,
}

impl RuntimeInfo {
    /// True when the major version is known and older than [`MIN_JAVA_MAJOR`].
    pub fn is_outdated(&self) -> bool {
        self.major.is_some_and(|m| m < MIN_JAVA_MAJOR)
    }
}

/// The Java runtime used to run the analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaRuntime {
    command: String,
}

impl JavaRuntime {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Executable name or path used for probing and invocation.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub async fn probe(&self) -> RunResult {
        probe(&self.command).await
    }

    /// Probe the runtime and fail with `MissingRuntime` when it does not run.
    pub async fn require(&self, hint: &str) -> crate::Result<RuntimeInfo> {
        let result = self.probe().await;
        if !result.success() {
            tracing::debug!(
                command = %self.command,
                exit_code = %result.exit_code(),
                "runtime probe failed"
            );
            return Err(XrayError::MissingRuntime {
                runtime: "Java".to_string(),
                hint: hint.to_string(),
            });
        }

        let version_line = version_line(&result).unwrap_or_else(|| "unknown version".to_string());
        let major = parse_java_major(&version_line);
        Ok(RuntimeInfo {
            version_line,
            major,
        })
    }
}

impl Default for JavaRuntime {
    fn default() -> Self {
        Self::new("java")
    }
}
