//! Data models for the scan agent.
//!
//! This module contains the core data structures shared by the fetcher,
//! the scanners, the result store and the agent loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Default branch used when a task does not name one.
pub const DEFAULT_BRANCH: &str = "main";

/// The external scanner families wrapped by the scan tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanToolKind {
    /// bandit + pycodestyle over Python sources
    PythonStyle,
    /// sqlcheck over every `.sql` file
    Sql,
    /// horusec vulnerability scan
    Vulnerability,
}

impl ScanToolKind {
    /// The registry name of the tool wrapping this scanner.
    pub fn tool_name(&self) -> ToolName {
        match self {
            ScanToolKind::PythonStyle => ToolName::PythonCodeAnalysis,
            ScanToolKind::Sql => ToolName::SqlAnalysis,
            ScanToolKind::Vulnerability => ToolName::SecurityVulnerabilityAnalysis,
        }
    }
}

impl fmt::Display for ScanToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanToolKind::PythonStyle => write!(f, "Bandit/pycodestyle"),
            ScanToolKind::Sql => write!(f, "SQLCheck"),
            ScanToolKind::Vulnerability => write!(f, "Horusec"),
        }
    }
}

/// Names of every tool the agent loop may select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    PythonCodeAnalysis,
    SqlAnalysis,
    SecurityVulnerabilityAnalysis,
    GenerateReport,
}

impl ToolName {
    pub const ALL: [ToolName; 4] = [
        ToolName::PythonCodeAnalysis,
        ToolName::SqlAnalysis,
        ToolName::SecurityVulnerabilityAnalysis,
        ToolName::GenerateReport,
    ];

    /// Human-readable name presented to the reasoning step.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::PythonCodeAnalysis => "Python Code Analysis",
            ToolName::SqlAnalysis => "SQL Analysis",
            ToolName::SecurityVulnerabilityAnalysis => "Security Vulnerability Analysis",
            ToolName::GenerateReport => "Generate Report",
        }
    }

    /// Match a tool name leniently: case, whitespace, underscores, dashes and
    /// surrounding quotes are ignored.
    pub fn from_loose(raw: &str) -> Option<Self> {
        let wanted = normalize_name(raw);
        if wanted.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|name| normalize_name(name.as_str()) == wanted)
    }
}

fn normalize_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report layout requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    #[default]
    DetailedReport,
    Summary,
    Json,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::DetailedReport => write!(f, "Detailed Report"),
            ReportFormat::Summary => write!(f, "Summary"),
            ReportFormat::Json => write!(f, "JSON"),
        }
    }
}

/// Natural language the report should be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ReportLanguage {
    #[default]
    English,
    Spanish,
    French,
    German,
    Portuguese,
    Japanese,
    Chinese,
}

impl fmt::Display for ReportLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportLanguage::English => "English",
            ReportLanguage::Spanish => "Spanish",
            ReportLanguage::French => "French",
            ReportLanguage::German => "German",
            ReportLanguage::Portuguese => "Portuguese",
            ReportLanguage::Japanese => "Japanese",
            ReportLanguage::Chinese => "Chinese",
        };
        f.write_str(name)
    }
}

/// Access token for private repositories. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// One analysis request. Built once per caller request and never mutated.
#[derive(Debug, Clone)]
pub struct AnalysisTask {
    repository_url: String,
    branch: String,
    directory: String,
    credential: Option<Credential>,
    selected_tool: Option<ToolName>,
    output_format: ReportFormat,
    output_language: ReportLanguage,
}

impl AnalysisTask {
    /// Create a task for the repository root on the default branch.
    pub fn new(repository_url: impl Into<String>) -> Self {
        Self {
            repository_url: repository_url.into().trim().to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            directory: String::new(),
            credential: None,
            selected_tool: None,
            output_format: ReportFormat::default(),
            output_language: ReportLanguage::default(),
        }
    }

    /// Set the branch. Blank values keep the default.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        let branch = branch.into();
        if !branch.trim().is_empty() {
            self.branch = branch.trim().to_string();
        }
        self
    }

    pub fn with_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = directory.into().trim().to_string();
        self
    }

    /// Attach a credential. Blank tokens are ignored.
    pub fn with_credential(mut self, credential: Option<Credential>) -> Self {
        self.credential = credential.filter(|c| !c.expose().trim().is_empty());
        self
    }

    pub fn with_selected_tool(mut self, tool: Option<ToolName>) -> Self {
        self.selected_tool = tool;
        self
    }

    pub fn with_output_format(mut self, format: ReportFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn with_output_language(mut self, language: ReportLanguage) -> Self {
        self.output_language = language;
        self
    }

    pub fn repository_url(&self) -> &str {
        &self.repository_url
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Directory inside the repository; empty means the root.
    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn selected_tool(&self) -> Option<ToolName> {
        self.selected_tool
    }

    pub fn output_format(&self) -> ReportFormat {
        self.output_format
    }

    pub fn output_language(&self) -> ReportLanguage {
        self.output_language
    }

    /// Directory label for display.
    pub fn directory_label(&self) -> &str {
        if self.directory.is_empty() {
            "Root"
        } else {
            &self.directory
        }
    }
}

/// Opaque identifier of one stored scan result (random 128-bit UUID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(Uuid);

impl Identifier {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Identifier {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Raw output of one scanner invocation, as kept by the result store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub identifier: Identifier,
    pub raw_text: String,
    pub source_tool: ScanToolKind,
    pub stored_at: DateTime<Utc>,
}

/// One think/act/observe cycle of the agent loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStep {
    pub thought: String,
    /// `None` when the reasoning output could not be parsed.
    pub chosen_tool: Option<ToolName>,
    pub action_input: String,
    pub observation: String,
}

/// Terminal answer of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalAnswer {
    pub text: String,
}

/// What a successful agent run hands back to its caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutcome {
    pub answer: FinalAnswer,
    pub transcript: Vec<AgentStep>,
}

impl AgentOutcome {
    /// Number of loop iterations that were consumed.
    pub fn iterations(&self) -> usize {
        self.transcript.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_defaults() {
        let task = AnalysisTask::new(" https://github.com/org/repo ");
        assert_eq!(task.repository_url(), "https://github.com/org/repo");
        assert_eq!(task.branch(), "main");
        assert_eq!(task.directory(), "");
        assert_eq!(task.directory_label(), "Root");
        assert!(task.credential().is_none());
        assert_eq!(task.output_format(), ReportFormat::DetailedReport);
        assert_eq!(task.output_language(), ReportLanguage::English);
    }

    #[test]
    fn test_blank_branch_and_token_are_ignored() {
        let task = AnalysisTask::new("https://github.com/org/repo")
            .with_branch("  ")
            .with_credential(Some(Credential::new(" ")));
        assert_eq!(task.branch(), "main");
        assert!(task.credential().is_none());
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let cred = Credential::new("ghp_secret");
        assert_eq!(format!("{:?}", cred), "Credential(***)");
        let task = AnalysisTask::new("https://x/y").with_credential(Some(cred));
        assert!(!format!("{:?}", task).contains("ghp_secret"));
    }

    #[test]
    fn test_tool_name_loose_matching() {
        assert_eq!(
            ToolName::from_loose("SQL Analysis"),
            Some(ToolName::SqlAnalysis)
        );
        assert_eq!(
            ToolName::from_loose("`python_code_analysis`"),
            Some(ToolName::PythonCodeAnalysis)
        );
        assert_eq!(
            ToolName::from_loose("\"generate report\""),
            Some(ToolName::GenerateReport)
        );
        assert_eq!(ToolName::from_loose("Rust Analysis"), None);
        assert_eq!(ToolName::from_loose("  "), None);
    }

    #[test]
    fn test_identifier_parse_round_trip() {
        let id = Identifier::generate();
        let parsed: Identifier = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-an-id".parse::<Identifier>().is_err());
    }

    #[test]
    fn test_scan_kind_maps_to_tool() {
        assert_eq!(ScanToolKind::Sql.tool_name(), ToolName::SqlAnalysis);
        assert_eq!(
            ScanToolKind::Vulnerability.tool_name(),
            ToolName::SecurityVulnerabilityAnalysis
        );
    }
}
