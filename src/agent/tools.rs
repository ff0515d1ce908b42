//! Tool definitions for the scan agent.
//!
//! This module defines the fixed set of tools the reasoning step may select,
//! and the entry points behind them. Entry points take one serialized string
//! and always return one string: failures become text, never errors.

use crate::error::ParseError;
use crate::models::{AgentStep, AnalysisTask, Credential, Identifier, ScanToolKind, ToolName};
use crate::repo::{FetchRequest, RepoFetcher};
use crate::scanner::Scanner;
use crate::store::ResultStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Input contract shared by the scan tools.
pub const SCAN_INPUT_CONTRACT: &str = "github_url|branch|directory|token";

/// Input contract of the report tool.
pub const REPORT_INPUT_CONTRACT: &str = "identifier";

/// Static description of one tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: ToolName,
    pub description: &'static str,
    pub input_contract: &'static str,
}

impl ToolDescriptor {
    pub fn for_name(name: ToolName) -> Self {
        let (description, input_contract) = match name {
            ToolName::PythonCodeAnalysis => (
                "Clone a GitHub repository and perform Bandit and PEP8 (pycodestyle) analysis.",
                SCAN_INPUT_CONTRACT,
            ),
            ToolName::SqlAnalysis => (
                "Analyze SQL content from a GitHub repository using SQLCheck.",
                SCAN_INPUT_CONTRACT,
            ),
            ToolName::SecurityVulnerabilityAnalysis => (
                "Clone a GitHub repository and perform security analysis using Horusec.",
                SCAN_INPUT_CONTRACT,
            ),
            ToolName::GenerateReport => (
                "Fetch the stored analysis results for an identifier so a report can be written.",
                REPORT_INPUT_CONTRACT,
            ),
        };
        Self {
            name,
            description,
            input_contract,
        }
    }
}

/// A capability the agent loop can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;

    /// Run the tool. The task supplies defaults (branch, credential) and the
    /// metadata the report needs.
    async fn invoke(&self, input: &str, task: &AnalysisTask) -> String;
}

/// Parsed input of a scan tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub url: String,
    pub branch: String,
    pub directory: String,
    pub credential: Option<Credential>,
}

impl ScanRequest {
    /// Parse `url`, `url|directory`, `url|branch|directory` or
    /// `url|branch|directory|token`. Blank branch and token fall back to the
    /// task's values.
    pub fn parse(input: &str, task: &AnalysisTask) -> Result<Self, String> {
        let fields: Vec<&str> = clean_input(input).split('|').map(str::trim).collect();

        let (url, branch, directory, token) = match fields.as_slice() {
            [url] => (*url, "", "", ""),
            [url, directory] => (*url, "", *directory, ""),
            [url, branch, directory] => (*url, *branch, *directory, ""),
            [url, branch, directory, token] => (*url, *branch, *directory, *token),
            _ => {
                return Err(format!(
                    "expected at most 4 fields in the format '{}'",
                    SCAN_INPUT_CONTRACT
                ))
            }
        };

        if url.is_empty() {
            return Err("the repository URL is missing".to_string());
        }

        Ok(Self {
            url: url.to_string(),
            branch: if branch.is_empty() {
                task.branch().to_string()
            } else {
                branch.to_string()
            },
            directory: directory.to_string(),
            credential: if token.is_empty() {
                task.credential().cloned()
            } else {
                Some(Credential::new(token))
            },
        })
    }
}

/// Hide the token field of a pipe-delimited scan input.
pub fn redact_input(input: &str) -> String {
    let fields: Vec<&str> = input.split('|').collect();
    if fields.len() == 4 && !fields[3].trim().is_empty() {
        format!("{}|{}|{}|***", fields[0], fields[1], fields[2])
    } else {
        input.to_string()
    }
}

/// Copy of a transcript safe to print or serialize.
pub fn redact_transcript(transcript: &[AgentStep]) -> Vec<AgentStep> {
    transcript
        .iter()
        .map(|step| AgentStep {
            action_input: redact_input(&step.action_input),
            ..step.clone()
        })
        .collect()
}

/// Strip whitespace, quotes and code fences the reasoning step may add.
fn clean_input(input: &str) -> &str {
    input
        .trim()
        .trim_matches(|c| c == '`' || c == '"' || c == '\'')
        .trim()
}

/// Clone, scan, store. Wraps one [`Scanner`].
pub struct ScanTool {
    descriptor: ToolDescriptor,
    scanner: Arc<dyn Scanner>,
    fetcher: RepoFetcher,
    store: Arc<ResultStore>,
}

impl ScanTool {
    pub fn new(scanner: Arc<dyn Scanner>, fetcher: RepoFetcher, store: Arc<ResultStore>) -> Self {
        Self {
            descriptor: ToolDescriptor::for_name(scanner.kind().tool_name()),
            scanner,
            fetcher,
            store,
        }
    }

    fn kind(&self) -> ScanToolKind {
        self.scanner.kind()
    }
}

#[async_trait]
impl Tool for ScanTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, input: &str, task: &AnalysisTask) -> String {
        let request = match ScanRequest::parse(input, task) {
            Ok(r) => r,
            Err(e) => return format!("Invalid input for {}: {}", self.descriptor.name, e),
        };
        debug!("Scan request: {:?}", request);

        let workspace = match self
            .fetcher
            .fetch(FetchRequest {
                url: request.url.clone(),
                branch: Some(request.branch.clone()),
                credential: request.credential.clone(),
            })
            .await
        {
            Ok(w) => w,
            Err(e) => {
                warn!("Clone failed: {}", e);
                return format!("Error cloning the repository: {}", e);
            }
        };

        let scanned = self.scanner.run(workspace.path(), &request.directory).await;
        workspace.release().await;

        match scanned {
            Ok(output) => {
                let identifier = self.store.store(output.tool, output.text).await;
                format!("Analysis results saved. Identifier: {}", identifier)
            }
            Err(e) => {
                warn!("{} scan failed: {}", self.kind(), e);
                format!("Error running {}: {}", self.kind(), e)
            }
        }
    }
}

/// Hands stored raw text plus task metadata to the report writer.
pub struct ReportTool {
    descriptor: ToolDescriptor,
    store: Arc<ResultStore>,
}

impl ReportTool {
    pub fn new(store: Arc<ResultStore>) -> Self {
        Self {
            descriptor: ToolDescriptor::for_name(ToolName::GenerateReport),
            store,
        }
    }
}

#[async_trait]
impl Tool for ReportTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, input: &str, task: &AnalysisTask) -> String {
        let raw = clean_input(input);
        let raw = raw
            .strip_prefix("Identifier:")
            .or_else(|| raw.strip_prefix("identifier:"))
            .map(str::trim)
            .unwrap_or(raw);

        let result = raw
            .parse::<Identifier>()
            .ok()
            .and_then(|id| self.store.retrieve(&id).ok());

        let Some(result) = result else {
            return format!("No results found for Identifier: {}", raw);
        };

        format!(
            "Repository: {}\nDirectory: {}\nBranch: {}\nReport Format: {}\nReport Language: {}\nSource Tool: {}\n\nQuery Identifier: {}\nQuery Result: {}\n",
            task.repository_url(),
            task.directory_label(),
            task.branch(),
            task.output_format(),
            task.output_language(),
            result.source_tool,
            result.identifier,
            result.raw_text
        )
    }
}

/// The ordered, read-only set of tools offered to the agent loop.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard registry: one scan tool per scanner, then the report tool.
    pub fn standard(
        scanners: Vec<Arc<dyn Scanner>>,
        fetcher: RepoFetcher,
        store: Arc<ResultStore>,
    ) -> Self {
        let mut registry = Self::new();
        for scanner in scanners {
            registry.register(Arc::new(ScanTool::new(
                scanner,
                fetcher.clone(),
                Arc::clone(&store),
            )));
        }
        registry.register(Arc::new(ReportTool::new(store)));
        info!("Registered tools: {}", registry.tool_names());
        registry
    }

    /// Add a tool. A tool with the same name replaces the earlier one in place.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.descriptor().name;
        match self
            .tools
            .iter_mut()
            .find(|t| t.descriptor().name == name)
        {
            Some(existing) => *existing = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn get(&self, name: ToolName) -> Option<Arc<dyn Tool>> {
        self.tools
            .iter()
            .find(|t| t.descriptor().name == name)
            .cloned()
    }

    /// Validate a tool name emitted by the reasoning step.
    pub fn resolve(&self, raw: &str) -> Result<ToolName, ParseError> {
        ToolName::from_loose(raw)
            .filter(|name| self.get(*name).is_some())
            .ok_or_else(|| ParseError::UnknownTool {
                name: raw.trim().to_string(),
                available: self.tool_names(),
            })
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor())
    }

    /// Comma-separated tool names, in registration order.
    pub fn tool_names(&self) -> String {
        self.descriptors()
            .map(|d| d.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// One line per tool for the reasoning prompt.
    pub fn describe(&self) -> String {
        self.descriptors()
            .map(|d| {
                format!(
                    "{}: {} Input format: '{}'.",
                    d.name, d.description, d.input_contract
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
