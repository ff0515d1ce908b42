//! Error types for the scan agent.
//!
//! Fetch and tool failures are converted to observation text at the tool
//! boundary; only [`AgentError`] ever reaches the caller of the agent loop.

use crate::models::{AgentStep, Identifier};
use std::path::PathBuf;
use thiserror::Error;

/// Errors while cloning a repository into a workspace.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The locator is not a remote repository URL we can clone.
    #[error("Invalid repository URL: {0}")]
    InvalidUrl(String),

    /// The ephemeral workspace could not be created.
    #[error("Failed to create workspace: {0}")]
    Workspace(#[source] std::io::Error),

    /// The remote rejected the supplied credential.
    #[error("Authentication failed for {url}: {message}")]
    Authentication { url: String, message: String },

    /// Any other clone failure (network, missing branch, ...).
    #[error("Failed to clone repository {url}: {source}")]
    Clone {
        url: String,
        #[source]
        source: git2::Error,
    },

    /// The blocking clone task panicked or was aborted.
    #[error("Clone task failed: {0}")]
    Task(String),
}

/// Errors while running an external scanner.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {seconds}s")]
    Timeout { program: String, seconds: u64 },

    /// Error-severity diagnostics were reported even though the process exited.
    #[error("Error in {program} analysis: {stderr}")]
    Diagnostic { program: String, stderr: String },

    /// The requested scan directory escapes the workspace.
    #[error("Invalid scan path: {0}")]
    InvalidPath(String),

    #[error("Scan path does not exist: {}", .0.display())]
    MissingPath(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed output from the reasoning step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Could not find an 'Action:' or 'Final Answer:' in the response")]
    MissingAction,

    #[error("Missing 'Action Input:' after 'Action: {0}'")]
    MissingActionInput(String),

    #[error("Response contains both an action and a final answer")]
    Ambiguous,

    #[error("'Final Answer:' is empty")]
    EmptyAnswer,

    #[error("'{name}' is not a valid tool, try one of [{available}]")]
    UnknownTool { name: String, available: String },
}

/// Result store lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("No results found for Identifier: {0}")]
    NotFound(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),
}

impl StoreError {
    pub fn not_found(id: &Identifier) -> Self {
        StoreError::NotFound(id.to_string())
    }
}

/// Terminal failures of an agent run.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The loop never produced a final answer. Carries the transcript so the
    /// caller can still display what happened.
    #[error("Agent stopped after {iterations} iterations without a final answer")]
    IterationBudgetExceeded {
        iterations: usize,
        transcript: Vec<AgentStep>,
    },

    /// The reasoning backend could not be reached or answered garbage.
    #[error("Reasoning engine error: {0}")]
    Reasoning(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ToolError::Timeout {
            program: "horusec".to_string(),
            seconds: 30,
        };
        assert_eq!(err.to_string(), "horusec timed out after 30s");

        let err = ParseError::UnknownTool {
            name: "Lint".to_string(),
            available: "SQL Analysis".to_string(),
        };
        assert!(err.to_string().contains("'Lint' is not a valid tool"));

        let err = AgentError::IterationBudgetExceeded {
            iterations: 10,
            transcript: Vec::new(),
        };
        assert!(err.to_string().contains("10 iterations"));
    }
}
