//! Vulnerability scanning with horusec.

use super::{resolve_scan_root, run_command, CommandSpec, ScanOutput, Scanner};
use crate::error::ToolError;
use crate::models::ScanToolKind;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Severity marker horusec writes for fatal problems.
const ERROR_MARKER: &str = "level=error";

/// Unlike the other adapters, an error-level line on stderr fails the scan
/// even when the process exits zero.
pub struct VulnerabilityScanner {
    horusec: CommandSpec,
    timeout: Duration,
}

impl VulnerabilityScanner {
    pub fn new(horusec: CommandSpec, timeout: Duration) -> Self {
        Self { horusec, timeout }
    }
}

#[async_trait]
impl Scanner for VulnerabilityScanner {
    fn kind(&self) -> ScanToolKind {
        ScanToolKind::Vulnerability
    }

    async fn run(&self, workspace: &Path, subpath: &str) -> Result<ScanOutput, ToolError> {
        let root = resolve_scan_root(workspace, subpath)?;
        info!("Running horusec on {}", root.display());

        let output = run_command(&self.horusec, &root, self.timeout).await?;

        if output.stderr.to_lowercase().contains(ERROR_MARKER) {
            warn!("horusec reported errors (exit {:?})", output.exit_code);
            return Err(ToolError::Diagnostic {
                program: self.horusec.program.clone(),
                stderr: output.stderr.trim().to_string(),
            });
        }

        Ok(ScanOutput {
            tool: self.kind(),
            text: format!("Horusec analysis results:\n{}", output.render()),
        })
    }
}
