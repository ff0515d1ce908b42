//! repo-scan-agent: LLM-driven orchestration of static-analysis scanners.
//!
//! This library clones repositories into ephemeral workspaces, runs external
//! scanners against them, keeps the raw results addressable by identifier,
//! and lets a reasoning model drive the whole thing through a bounded
//! think/act/observe loop.

// Core modules
pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod repo;
pub mod scanner;
pub mod store;

// Re-export commonly used error types
pub use error::{AgentError, FetchError, ParseError, StoreError, ToolError};
