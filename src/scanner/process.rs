//! Bounded execution of external scanner binaries.

use crate::error::ToolError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Placeholder in command arguments replaced by the scan target path.
pub const PATH_PLACEHOLDER: &str = "{path}";

/// How to invoke one external scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Executable name or path.
    pub program: String,
    /// Arguments; `{path}` is substituted with the scan target.
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Arguments with the target substituted. If no argument mentions the
    /// placeholder the target is appended.
    pub fn resolved_args(&self, target: &Path) -> Vec<String> {
        let target = target.to_string_lossy();
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace(PATH_PLACEHOLDER, &target))
            .collect();
        if !self.args.iter().any(|a| a.contains(PATH_PLACEHOLDER)) {
            args.push(target.into_owned());
        }
        args
    }
}

/// Captured output of a finished scanner process.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; `None` when killed by a signal.
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    /// Stdout followed by any advisory stderr.
    pub fn render(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n[stderr]\n{}\n", self.stdout, stderr)
        }
    }
}

/// Run a scanner against `target`, killing it once `timeout` elapses.
///
/// A non-zero exit status is not an error: linters exit non-zero whenever
/// they report findings.
pub async fn run_command(
    spec: &CommandSpec,
    target: &Path,
    timeout: Duration,
) -> Result<ProcessOutput, ToolError> {
    let args = spec.resolved_args(target);
    debug!("Running {} {:?}", spec.program, args);

    let child = Command::new(&spec.program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ToolError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

    // Dropping the timed-out future drops the child, which kills it.
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(ToolError::Timeout {
                program: spec.program.clone(),
                seconds: timeout.as_secs(),
            })
        }
    };

    let output = ProcessOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code(),
    };

    debug!(
        "{} exited with {:?} ({} bytes stdout, {} bytes stderr)",
        spec.program,
        output.exit_code,
        output.stdout.len(),
        output.stderr.len()
    );

    Ok(output)
}
