//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::{AnalysisTask, Credential, ReportFormat, ReportLanguage, ToolName, DEFAULT_BRANCH};
use crate::repo::validate_repo_url;
use clap::Parser;
use std::path::PathBuf;

/// Repo Scan Agent - LLM-driven static analysis for git repositories
///
/// Clones a repository, lets a local model pick among Python, SQL and
/// vulnerability scanners, and hands back a report built from their output.
///
/// Examples:
///   repo-scan-agent --repo https://github.com/owner/repo.git
///   repo-scan-agent --repo https://github.com/owner/repo.git --tool sql-analysis --directory db
///   repo-scan-agent --repo https://github.com/owner/private.git --token $REPO_SCAN_TOKEN --format summary
///   repo-scan-agent --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Repository URL to analyze
    ///
    /// Supports https, ssh and git@host:path URLs.
    #[arg(short, long, value_name = "URL", required_unless_present = "init_config")]
    pub repo: Option<String>,

    /// Branch to analyze
    #[arg(short, long, default_value = DEFAULT_BRANCH, value_name = "BRANCH")]
    pub branch: String,

    /// Subdirectory of the repository to scan (repository root if omitted)
    #[arg(short, long, default_value = "", value_name = "DIR")]
    pub directory: String,

    /// Access token for private repositories
    #[arg(long, env = "REPO_SCAN_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Preferred analysis tool (a hint to the agent)
    #[arg(long, value_name = "TOOL")]
    pub tool: Option<ToolName>,

    /// Report format requested from the agent
    #[arg(long, default_value = "detailed-report", value_name = "FORMAT")]
    pub format: ReportFormat,

    /// Report language requested from the agent
    #[arg(long, default_value = "english", value_name = "LANG")]
    pub language: ReportLanguage,

    /// Ollama model to reason with
    ///
    /// Overrides [model] name in the config file (default: llama3.2:latest).
    #[arg(short, long, value_name = "MODEL", env = "REPO_SCAN_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    ///
    /// Overrides [model] ollama_url in the config file (default: http://localhost:11434).
    #[arg(long, value_name = "URL", env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Temperature for LLM responses (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .repo-scan.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Request timeout for the model in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Timeout for each scanner process in seconds
    #[arg(long, value_name = "SECS")]
    pub scan_timeout: Option<u64>,

    /// Maximum think/act iterations before giving up
    #[arg(long, value_name = "COUNT")]
    pub max_iterations: Option<usize>,

    /// Parent directory for temporary clones
    #[arg(long, value_name = "DIR")]
    pub workspace_dir: Option<PathBuf>,

    /// Write the final answer to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Print every intermediate step after the run
    #[arg(long)]
    pub show_steps: bool,

    /// Print the answer and transcript as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .repo-scan.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The repository URL, empty when not set (validate first).
    pub fn repo_url(&self) -> &str {
        self.repo.as_deref().unwrap_or("")
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        validate_repo_url(self.repo_url()).map_err(|e| e.to_string())?;

        if let Some(ref url) = self.ollama_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        if self.max_iterations == Some(0) {
            return Err("Max iterations must be at least 1".to_string());
        }

        if self.timeout == Some(0) || self.scan_timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.directory.split(['/', '\\']).any(|part| part == "..") {
            return Err("Directory must stay inside the repository".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Build the task handed to the agent.
    pub fn to_task(&self) -> AnalysisTask {
        let credential = self
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(Credential::new);

        AnalysisTask::new(self.repo_url())
            .with_branch(self.branch.as_str())
            .with_directory(self.directory.as_str())
            .with_credential(credential)
            .with_selected_tool(self.tool)
            .with_output_format(self.format)
            .with_output_language(self.language)
    }
}
