//! Scan tool adapters.
//!
//! Each adapter wraps one external scanner binary. Adapters receive the root
//! of a cloned workspace plus a subdirectory, run their scanner as a bounded
//! subprocess and hand back the raw text it produced.

pub mod process;
pub mod security;
pub mod sql;
pub mod style;

use crate::error::ToolError;
use crate::models::ScanToolKind;
use async_trait::async_trait;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub use process::{run_command, CommandSpec, ProcessOutput};
pub use security::VulnerabilityScanner;
pub use sql::SqlScanner;
pub use style::PythonStyleScanner;

/// Raw output of one adapter run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutput {
    pub tool: ScanToolKind,
    pub text: String,
}

/// A wrapper around one external scanner.
#[async_trait]
pub trait Scanner: Send + Sync {
    fn kind(&self) -> ScanToolKind;

    /// Scan `workspace/subpath`.
    async fn run(&self, workspace: &Path, subpath: &str) -> Result<ScanOutput, ToolError>;
}

/// Commands and limits for every scanner.
#[derive(Debug, Clone)]
pub struct ScannerSettings {
    pub bandit: CommandSpec,
    pub pycodestyle: CommandSpec,
    pub sqlcheck: CommandSpec,
    pub horusec: CommandSpec,
    pub timeout: Duration,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            bandit: CommandSpec::new("bandit", &["-r", "{path}"]),
            pycodestyle: CommandSpec::new("pycodestyle", &["{path}"]),
            sqlcheck: CommandSpec::new("sqlcheck", &["-f", "{path}"]),
            horusec: CommandSpec::new("horusec", &["start", "-p", "{path}", "--disable-docker"]),
            timeout: Duration::from_secs(600),
        }
    }
}

impl From<&crate::config::ScannersConfig> for ScannerSettings {
    fn from(config: &crate::config::ScannersConfig) -> Self {
        Self {
            bandit: config.bandit.clone(),
            pycodestyle: config.pycodestyle.clone(),
            sqlcheck: config.sqlcheck.clone(),
            horusec: config.horusec.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }
}

/// Build one adapter per scanner family, in registry order.
pub fn build_scanners(settings: &ScannerSettings) -> Vec<Arc<dyn Scanner>> {
    vec![
        Arc::new(PythonStyleScanner::new(
            settings.bandit.clone(),
            settings.pycodestyle.clone(),
            settings.timeout,
        )),
        Arc::new(SqlScanner::new(settings.sqlcheck.clone(), settings.timeout)),
        Arc::new(VulnerabilityScanner::new(
            settings.horusec.clone(),
            settings.timeout,
        )),
    ]
}

/// Resolve the scan root inside a workspace.
///
/// Absolute paths and `..` components are rejected, and the resolved path
/// must stay inside the workspace after symlinks are followed.
pub fn resolve_scan_root(workspace: &Path, subpath: &str) -> Result<PathBuf, ToolError> {
    let subpath = subpath.trim().trim_matches('/');
    let relative = Path::new(subpath);

    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(ToolError::InvalidPath(subpath.to_string()));
    }

    let root = workspace.join(relative);
    if !root.exists() {
        return Err(ToolError::MissingPath(PathBuf::from(subpath)));
    }

    // Canonicalize paths to handle symlinks
    let canonical_workspace = fs::canonicalize(workspace)?;
    let canonical_root = fs::canonicalize(&root)?;
    if !canonical_root.starts_with(&canonical_workspace) {
        return Err(ToolError::InvalidPath(subpath.to_string()));
    }

    Ok(root)
}
