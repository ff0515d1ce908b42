//! SQL linting with sqlcheck, one invocation per `.sql` file.

use super::{resolve_scan_root, run_command, CommandSpec, ScanOutput, Scanner};
use crate::error::ToolError;
use crate::models::ScanToolKind;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Result text when the scan root holds no SQL.
pub const NO_SQL_FILES: &str = "No SQL files found in the specified directory.";

const SQL_EXTENSION: &str = "sql";

pub struct SqlScanner {
    sqlcheck: CommandSpec,
    timeout: Duration,
}

impl SqlScanner {
    pub fn new(sqlcheck: CommandSpec, timeout: Duration) -> Self {
        Self { sqlcheck, timeout }
    }
}

/// All `.sql` files under `root`, sorted, skipping `.git`.
pub fn find_sql_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git")
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(SQL_EXTENSION))
        })
        .collect();
    files.sort();
    files
}

#[async_trait]
impl Scanner for SqlScanner {
    fn kind(&self) -> ScanToolKind {
        ScanToolKind::Sql
    }

    async fn run(&self, workspace: &Path, subpath: &str) -> Result<ScanOutput, ToolError> {
        let root = resolve_scan_root(workspace, subpath)?;
        let files = find_sql_files(&root);

        if files.is_empty() {
            info!("No SQL files under {}", root.display());
            return Ok(ScanOutput {
                tool: self.kind(),
                text: NO_SQL_FILES.to_string(),
            });
        }

        info!("Running sqlcheck on {} files", files.len());
        let mut text = String::from("SQLCheck analysis results:");
        for file in &files {
            let output = run_command(&self.sqlcheck, file, self.timeout).await?;
            let name = file.strip_prefix(workspace).unwrap_or(file);
            text.push_str(&format!(
                "\n\n=== Results for {} ===\n{}",
                name.display(),
                output.render()
            ));
        }

        Ok(ScanOutput {
            tool: self.kind(),
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_sql_files_recursive() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("db/migrations")).unwrap();
        std::fs::create_dir_all(temp.path().join(".git")).unwrap();
        std::fs::write(temp.path().join("db/migrations/001.SQL"), "select 1;").unwrap();
        std::fs::write(temp.path().join("schema.sql"), "create table t();").unwrap();
        std::fs::write(temp.path().join(".git/hook.sql"), "x").unwrap();
        std::fs::write(temp.path().join("notes.txt"), "x").unwrap();

        let files = find_sql_files(temp.path());
        assert_eq!(
            files,
            vec![
                temp.path().join("db/migrations/001.SQL"),
                temp.path().join("schema.sql"),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_sql_files_skips_linter() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("app.py"), "print(1)").unwrap();

        // A linter that cannot be spawned proves it was never invoked.
        let scanner = SqlScanner::new(
            CommandSpec::new("no-such-sqlcheck", &["-f"]),
            Duration::from_secs(5),
        );
        let output = scanner.run(temp.path(), "").await.unwrap();
        assert_eq!(output.text, NO_SQL_FILES);
    }

    #[tokio::test]
    async fn test_one_section_per_sql_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.sql"), "select * from a;").unwrap();
        std::fs::write(temp.path().join("b.sql"), "select * from b;").unwrap();

        let scanner = SqlScanner::new(CommandSpec::new("echo", &["-f"]), Duration::from_secs(5));
        let output = scanner.run(temp.path(), "").await.unwrap();

        assert_eq!(output.tool, ScanToolKind::Sql);
        assert!(output.text.starts_with("SQLCheck analysis results:"));
        assert_eq!(output.text.matches("=== Results for ").count(), 2);

        let a = output.text.find("=== Results for a.sql ===").unwrap();
        let b = output.text.find("=== Results for b.sql ===").unwrap();
        assert!(a < b);
        assert!(output.text[a..b].contains(&format!(
            "-f {}",
            temp.path().join("a.sql").display()
        )));
    }
}
