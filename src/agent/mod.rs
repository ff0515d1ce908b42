//! LLM agent modules for repository analysis.
//!
//! This module provides the think/act/observe loop, the tool registry it
//! selects from, and the reasoning backends that drive it.

pub mod agent_loop;
pub mod parser;
pub mod prompt;
pub mod reasoning;
pub mod tools;

pub use agent_loop::{AgentConfig, AnalysisAgent};
pub use reasoning::{OllamaReasoner, OllamaSettings, ReasoningEngine};
pub use tools::{ReportTool, ScanTool, Tool, ToolDescriptor, ToolRegistry};
