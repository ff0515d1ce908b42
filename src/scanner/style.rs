//! Python style and security linting (bandit + pycodestyle).

use super::{resolve_scan_root, run_command, CommandSpec, ScanOutput, Scanner};
use crate::error::ToolError;
use crate::models::ScanToolKind;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Runs bandit and pycodestyle over the same root. Stderr is advisory.
pub struct PythonStyleScanner {
    bandit: CommandSpec,
    pycodestyle: CommandSpec,
    timeout: Duration,
}

impl PythonStyleScanner {
    pub fn new(bandit: CommandSpec, pycodestyle: CommandSpec, timeout: Duration) -> Self {
        Self {
            bandit,
            pycodestyle,
            timeout,
        }
    }
}

#[async_trait]
impl Scanner for PythonStyleScanner {
    fn kind(&self) -> ScanToolKind {
        ScanToolKind::PythonStyle
    }

    async fn run(&self, workspace: &Path, subpath: &str) -> Result<ScanOutput, ToolError> {
        let root = resolve_scan_root(workspace, subpath)?;
        info!("Running bandit and pycodestyle on {}", root.display());

        let (bandit, pycodestyle) = futures::try_join!(
            run_command(&self.bandit, &root, self.timeout),
            run_command(&self.pycodestyle, &root, self.timeout),
        )?;
        debug!(
            "bandit exit {:?}, pycodestyle exit {:?}",
            bandit.exit_code, pycodestyle.exit_code
        );

        Ok(ScanOutput {
            tool: self.kind(),
            text: format!(
                "Bandit analysis results:\n{}\n\npycodestyle analysis results:\n{}",
                bandit.render(),
                pycodestyle.render()
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_style_scan_concatenates_both_linters() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("pkg")).unwrap();

        let scanner = PythonStyleScanner::new(
            CommandSpec::new("sh", &["-c", "echo 'B101 assert used' ; exit 1"]),
            CommandSpec::new("sh", &["-c", "echo 'E501 line too long'; echo 'note' >&2"]),
            Duration::from_secs(10),
        );

        let output = scanner.run(temp.path(), "pkg").await.unwrap();
        assert_eq!(output.tool, ScanToolKind::PythonStyle);
        assert!(output.text.starts_with("Bandit analysis results:\nB101 assert used"));
        assert!(output
            .text
            .contains("pycodestyle analysis results:\nE501 line too long"));
        assert!(output.text.contains("[stderr]\nnote"));
    }

    #[tokio::test]
    async fn test_style_scan_missing_binary_is_tool_error() {
        let temp = TempDir::new().unwrap();
        let scanner = PythonStyleScanner::new(
            CommandSpec::new("no-such-bandit", &["-r", "{path}"]),
            CommandSpec::new("sh", &["-c", "true"]),
            Duration::from_secs(10),
        );
        let err = scanner.run(temp.path(), "").await.unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }
}
