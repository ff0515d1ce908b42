//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.repo-scan.toml` files.

use crate::agent::{AgentConfig, OllamaSettings};
use crate::repo::CloneOptions;
use crate::scanner::CommandSpec;
use crate::store::ollama::DEFAULT_EMBEDDING_MODEL;
use crate::store::{Embedder, HashingEmbedder, OllamaEmbedder, OllamaEmbedderSettings};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = ".repo-scan.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Agent loop settings.
    #[serde(default)]
    pub agent: AgentSettings,

    /// External scanner settings.
    #[serde(default)]
    pub scanners: ScannersConfig,

    /// Result store settings.
    #[serde(default)]
    pub store: StoreConfig,
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_model_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            ollama_url: default_ollama_url(),
            temperature: default_temperature(),
            timeout_seconds: default_model_timeout(),
        }
    }
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.5
}

fn default_model_timeout() -> u64 {
    300
}

/// Agent loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Maximum think/act iterations per task.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Timeout for one tool invocation (clone + scan) in seconds.
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_seconds: u64,

    /// Observations longer than this are truncated in the prompt.
    #[serde(default = "default_max_observation_chars")]
    pub max_observation_chars: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tool_timeout_seconds: default_tool_timeout(),
            max_observation_chars: default_max_observation_chars(),
        }
    }
}

fn default_max_iterations() -> usize {
    10
}

fn default_tool_timeout() -> u64 {
    1800
}

fn default_max_observation_chars() -> usize {
    60_000
}

/// External scanner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannersConfig {
    /// Per-process timeout in seconds.
    #[serde(default = "default_scan_timeout")]
    pub timeout_seconds: u64,

    /// Shallow clone depth; 0 clones full history.
    #[serde(default = "default_clone_depth")]
    pub clone_depth: i32,

    /// Parent directory for clone workspaces (system temp dir if unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_dir: Option<PathBuf>,

    #[serde(default = "default_bandit")]
    pub bandit: CommandSpec,

    #[serde(default = "default_pycodestyle")]
    pub pycodestyle: CommandSpec,

    #[serde(default = "default_sqlcheck")]
    pub sqlcheck: CommandSpec,

    #[serde(default = "default_horusec")]
    pub horusec: CommandSpec,
}

impl Default for ScannersConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_scan_timeout(),
            clone_depth: default_clone_depth(),
            workspace_dir: None,
            bandit: default_bandit(),
            pycodestyle: default_pycodestyle(),
            sqlcheck: default_sqlcheck(),
            horusec: default_horusec(),
        }
    }
}

fn default_scan_timeout() -> u64 {
    600
}

fn default_clone_depth() -> i32 {
    1
}

fn default_bandit() -> CommandSpec {
    CommandSpec::new("bandit", &["-r", "{path}"])
}

fn default_pycodestyle() -> CommandSpec {
    CommandSpec::new("pycodestyle", &["{path}"])
}

fn default_sqlcheck() -> CommandSpec {
    CommandSpec::new("sqlcheck", &["-f", "{path}"])
}

fn default_horusec() -> CommandSpec {
    CommandSpec::new("horusec", &["start", "-p", "{path}", "--disable-docker"])
}

/// Which embedder feeds the result store's vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// Local feature hashing; no network.
    #[default]
    Hashing,
    /// Ollama `/api/embed` on the configured server.
    Ollama,
}

/// Result store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum stored results; unbounded when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,

    #[serde(default)]
    pub embedder: EmbedderKind,

    /// Size of the hashing embedder's vectors.
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,

    /// Ollama model used when `embedder = "ollama"`.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: None,
            embedder: EmbedderKind::default(),
            embedding_dimensions: default_embedding_dimensions(),
            embedding_model: default_embedding_model(),
        }
    }
}

fn default_embedding_dimensions() -> usize {
    256
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.model.ollama_url = url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if let Some(max_iterations) = args.max_iterations {
            self.agent.max_iterations = max_iterations;
        }
        if let Some(scan_timeout) = args.scan_timeout {
            self.scanners.timeout_seconds = scan_timeout;
        }
        if let Some(ref dir) = args.workspace_dir {
            self.scanners.workspace_dir = Some(dir.clone());
        }
    }

    /// Settings for the reasoning backend.
    pub fn ollama_settings(&self) -> OllamaSettings {
        OllamaSettings {
            ollama_url: self.model.ollama_url.clone(),
            model_name: self.model.name.clone(),
            temperature: self.model.temperature,
            timeout_seconds: self.model.timeout_seconds,
        }
    }

    /// The embedder selected for the result store.
    pub fn embedder(&self) -> Result<Box<dyn Embedder>> {
        match self.store.embedder {
            EmbedderKind::Hashing => Ok(Box::new(HashingEmbedder::new(
                self.store.embedding_dimensions,
            ))),
            EmbedderKind::Ollama => {
                let embedder = OllamaEmbedder::new(OllamaEmbedderSettings {
                    ollama_url: self.model.ollama_url.clone(),
                    model_name: self.store.embedding_model.clone(),
                    timeout_seconds: self.model.timeout_seconds,
                })
                .context("Failed to initialize Ollama embedder")?;
                Ok(Box::new(embedder))
            }
        }
    }

    /// Settings for the agent loop.
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_iterations: self.agent.max_iterations,
            tool_timeout: Duration::from_secs(self.agent.tool_timeout_seconds),
            max_observation_chars: self.agent.max_observation_chars,
        }
    }

    /// Settings for the repository fetcher.
    pub fn clone_options(&self, show_progress: bool) -> CloneOptions {
        CloneOptions {
            depth: (self.scanners.clone_depth > 0).then_some(self.scanners.clone_depth),
            show_progress,
            workspace_root: self.scanners.workspace_dir.clone(),
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, "llama3.2:latest");
        assert_eq!(config.agent.max_iterations, 10);
        assert_eq!(config.scanners.sqlcheck.program, "sqlcheck");
        assert!(config.store.capacity.is_none());
        assert_eq!(config.store.embedder, EmbedderKind::Hashing);
        assert_eq!(config.embedder().unwrap().dimensions(), 256);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[model]
name = "codellama:34b"
temperature = 0.2

[agent]
max_iterations = 6

[scanners]
timeout_seconds = 120
clone_depth = 0
horusec = { program = "/opt/horusec", args = ["start", "-p", "{path}"] }

[store]
capacity = 500
embedder = "ollama"
embedding_model = "mxbai-embed-large"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.model.name, "codellama:34b");
        assert_eq!(config.model.temperature, 0.2);
        assert_eq!(config.model.ollama_url, "http://localhost:11434");
        assert_eq!(config.agent.max_iterations, 6);
        assert_eq!(config.agent.tool_timeout_seconds, 1800);
        assert_eq!(config.scanners.timeout_seconds, 120);
        assert_eq!(config.scanners.horusec.program, "/opt/horusec");
        assert_eq!(config.scanners.bandit.program, "bandit");
        assert_eq!(config.store.capacity, Some(500));
        assert_eq!(config.store.embedder, EmbedderKind::Ollama);
        assert_eq!(config.store.embedding_model, "mxbai-embed-large");
        assert_eq!(config.store.embedding_dimensions, 256);
        assert!(config.clone_options(false).depth.is_none());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[agent]"));
        assert!(toml_str.contains("[scanners"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.scanners.horusec, default_horusec());
    }

    #[test]
    fn test_file_model_settings_survive_merge() {
        use clap::Parser;

        let mut config: Config = toml::from_str(
            "[model]\nname = \"codellama:34b\"\nollama_url = \"http://gpu-box:11434\"\n",
        )
        .unwrap();
        let mut args =
            crate::cli::Args::try_parse_from(["repo-scan-agent", "--repo", "https://github.com/o/r"])
                .unwrap();
        // Environment variables feed these flags too.
        args.model = None;
        args.ollama_url = None;

        config.merge_with_args(&args);
        assert_eq!(config.model.name, "codellama:34b");
        assert_eq!(config.model.ollama_url, "http://gpu-box:11434");

        args.model = Some("qwen2.5-coder:32b".to_string());
        config.merge_with_args(&args);
        assert_eq!(config.model.name, "qwen2.5-coder:32b");
        assert_eq!(config.model.ollama_url, "http://gpu-box:11434");
    }

    #[test]
    fn test_derived_settings() {
        let config = Config::default();
        assert_eq!(config.agent_config().tool_timeout, Duration::from_secs(1800));
        assert_eq!(config.clone_options(true).depth, Some(1));
        assert_eq!(config.ollama_settings().model_name, "llama3.2:latest");
    }
}
