//! Agent loop for tool-based repository analysis.
//!
//! The loop is a small state machine:
//! `Thinking -> Acting -> Observing -> (Thinking | Done)`.
//! Tool failures and unparsable reasoning output become observations, so a
//! task only fails when the iteration budget runs out or the reasoning
//! backend itself is unavailable.

use crate::agent::parser::{parse_response, Decision};
use crate::agent::prompt::render_prompt;
use crate::agent::reasoning::ReasoningEngine;
use crate::agent::tools::{redact_input, ToolRegistry};
use crate::error::AgentError;
use crate::models::{AgentOutcome, AgentStep, AnalysisTask, FinalAnswer, ToolName};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Upper bound on think/act cycles per task.
    pub max_iterations: usize,
    /// Upper bound on a single tool invocation (clone + scan).
    pub tool_timeout: Duration,
    /// Observations are cut to this many characters in the prompt.
    pub max_observation_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            tool_timeout: Duration::from_secs(1800),
            max_observation_chars: 60_000,
        }
    }
}

/// Pending tool call chosen while thinking.
#[derive(Debug)]
struct PlannedAction {
    thought: String,
    tool: ToolName,
    input: String,
}

#[derive(Debug)]
enum AgentState {
    Thinking,
    Acting(PlannedAction),
    Observing(AgentStep),
    Done(FinalAnswer),
}

impl AgentState {
    fn name(&self) -> &'static str {
        match self {
            AgentState::Thinking => "THINKING",
            AgentState::Acting(_) => "ACTING",
            AgentState::Observing(_) => "OBSERVING",
            AgentState::Done(_) => "DONE",
        }
    }
}

/// Runs tasks against a fixed tool registry.
pub struct AnalysisAgent {
    config: AgentConfig,
    registry: Arc<ToolRegistry>,
    reasoner: Arc<dyn ReasoningEngine>,
}

impl AnalysisAgent {
    pub fn new(
        config: AgentConfig,
        registry: Arc<ToolRegistry>,
        reasoner: Arc<dyn ReasoningEngine>,
    ) -> Self {
        info!(
            "Initializing agent with {} tools, max {} iterations",
            registry.len(),
            config.max_iterations
        );
        Self {
            config,
            registry,
            reasoner,
        }
    }

    /// Drive one task to a final answer.
    pub async fn run(&self, task: &AnalysisTask) -> Result<AgentOutcome, AgentError> {
        info!("Starting analysis of {}", task.repository_url());

        let mut transcript: Vec<AgentStep> = Vec::new();
        let mut state = AgentState::Thinking;

        loop {
            debug!("Agent state: {}", state.name());
            state = match state {
                AgentState::Thinking => {
                    if transcript.len() >= self.config.max_iterations {
                        warn!(
                            "No final answer after {} iterations",
                            self.config.max_iterations
                        );
                        return Err(AgentError::IterationBudgetExceeded {
                            iterations: transcript.len(),
                            transcript,
                        });
                    }
                    self.think(task, &transcript).await?
                }
                AgentState::Acting(action) => {
                    let observation = self.act(action.tool, &action.input, task).await;
                    AgentState::Observing(AgentStep {
                        thought: action.thought,
                        chosen_tool: Some(action.tool),
                        action_input: action.input,
                        observation,
                    })
                }
                AgentState::Observing(step) => {
                    transcript.push(step);
                    AgentState::Thinking
                }
                AgentState::Done(answer) => {
                    info!("Agent finished after {} iterations", transcript.len());
                    return Ok(AgentOutcome { answer, transcript });
                }
            };
        }
    }

    /// One reasoning call. Parse failures skip straight to observing.
    async fn think(
        &self,
        task: &AnalysisTask,
        transcript: &[AgentStep],
    ) -> Result<AgentState, AgentError> {
        let prompt = render_prompt(
            task,
            &self.registry,
            transcript,
            self.config.max_observation_chars,
        );
        let response = self.reasoner.complete(&prompt).await?;
        debug!("Reasoning output:\n{}", response);

        let decision = parse_response(&response).and_then(|decision| match decision {
            Decision::Finish { answer, .. } => Ok(AgentState::Done(FinalAnswer { text: answer })),
            Decision::Act {
                thought,
                tool,
                input,
            } => self.registry.resolve(&tool).map(|tool| {
                AgentState::Acting(PlannedAction {
                    thought,
                    tool,
                    input,
                })
            }),
        });

        Ok(decision.unwrap_or_else(|e| {
            warn!("Unparsable reasoning output: {}", e);
            AgentState::Observing(AgentStep {
                thought: response.trim().to_string(),
                chosen_tool: None,
                action_input: String::new(),
                observation: format!(
                    "Invalid Format: {}. Reply with 'Action:' and 'Action Input:' lines, or with 'Final Answer:'.",
                    e
                ),
            })
        }))
    }

    /// Run a tool, turning a timeout into an observation.
    async fn act(&self, name: ToolName, input: &str, task: &AnalysisTask) -> String {
        let Some(tool) = self.registry.get(name) else {
            return format!(
                "{} is not a valid tool, try one of [{}].",
                name,
                self.registry.tool_names()
            );
        };

        info!("Invoking tool {} with input: {}", name, redact_input(input));
        match tokio::time::timeout(self.config.tool_timeout, tool.invoke(input, task)).await {
            Ok(observation) => {
                info!("Tool {} executed", name);
                observation
            }
            Err(_) => {
                warn!("Tool {} timed out", name);
                format!(
                    "Error: {} timed out after {}s.",
                    name,
                    self.config.tool_timeout.as_secs()
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tools::{Tool, ToolDescriptor};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays canned reasoning outputs; repeats the last one forever.
    struct ScriptedReasoner {
        responses: Mutex<VecDeque<String>>,
        last: Mutex<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedReasoner {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
                last: Mutex::new(String::new()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ReasoningEngine for ScriptedReasoner {
        async fn complete(&self, prompt: &str) -> Result<String, AgentError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let mut last = self.last.lock().unwrap();
            if let Some(next) = self.responses.lock().unwrap().pop_front() {
                *last = next;
            }
            Ok(last.clone())
        }
    }

    /// Counts invocations and answers with a fixed observation.
    struct CountingTool {
        descriptor: ToolDescriptor,
        calls: AtomicUsize,
        reply: String,
        delay: Option<Duration>,
    }

    impl CountingTool {
        fn new(name: ToolName, reply: &str) -> Self {
            Self {
                descriptor: ToolDescriptor::for_name(name),
                calls: AtomicUsize::new(0),
                reply: reply.to_string(),
                delay: None,
            }
        }
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn descriptor(&self) -> &ToolDescriptor {
            &self.descriptor
        }

        async fn invoke(&self, input: &str, _task: &AnalysisTask) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.reply.replace("{input}", input)
        }
    }

    fn agent_with(
        tools: Vec<Arc<CountingTool>>,
        reasoner: Arc<ScriptedReasoner>,
        config: AgentConfig,
    ) -> AnalysisAgent {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool);
        }
        AnalysisAgent::new(config, Arc::new(registry), reasoner)
    }

    fn task() -> AnalysisTask {
        AnalysisTask::new("https://github.com/org/repo")
            .with_selected_tool(Some(ToolName::SqlAnalysis))
    }

    #[tokio::test]
    async fn test_scan_then_report_then_answer() {
        let scan = Arc::new(CountingTool::new(
            ToolName::SqlAnalysis,
            "Analysis results saved. Identifier: 42",
        ));
        let report = Arc::new(CountingTool::new(
            ToolName::GenerateReport,
            "Query Identifier: {input}\nQuery Result: SELECT * used",
        ));
        let reasoner = Arc::new(ScriptedReasoner::new(&[
            " I should scan the SQL files.\nAction: SQL Analysis\nAction Input: https://github.com/org/repo|main||",
            " The results are stored.\nAction: Generate Report\nAction Input: 42",
            " I now know what to do. I will generate the report.\nFinal Answer: 1 finding: SELECT * used",
        ]));

        let agent = agent_with(
            vec![Arc::clone(&scan), Arc::clone(&report)],
            Arc::clone(&reasoner),
            AgentConfig::default(),
        );
        let outcome = agent.run(&task()).await.unwrap();

        assert_eq!(outcome.answer.text, "1 finding: SELECT * used");
        assert_eq!(outcome.iterations(), 2);
        assert_eq!(outcome.transcript.len(), 2);
        assert_eq!(outcome.transcript[0].chosen_tool, Some(ToolName::SqlAnalysis));
        assert_eq!(outcome.transcript[1].chosen_tool, Some(ToolName::GenerateReport));
        assert_eq!(
            outcome.transcript[1].observation,
            "Query Identifier: 42\nQuery Result: SELECT * used"
        );
        assert_eq!(scan.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.calls.load(Ordering::SeqCst), 1);

        // The hint and earlier observations reach every reasoning call.
        let prompts = reasoner.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 3);
        assert!(prompts.iter().all(|p| p.contains("Selected Tool: SQL Analysis")));
        assert!(prompts[2].contains("Observation: Analysis results saved. Identifier: 42"));
    }

    #[tokio::test]
    async fn test_budget_exceeded_after_ten_actions() {
        let scan = Arc::new(CountingTool::new(ToolName::SqlAnalysis, "still working"));
        let reasoner = Arc::new(ScriptedReasoner::new(&[
            "Let me try again.\nAction: SQL Analysis\nAction Input: https://github.com/org/repo",
        ]));

        let agent = agent_with(vec![Arc::clone(&scan)], reasoner, AgentConfig::default());
        let err = agent.run(&task()).await.unwrap_err();

        match err {
            AgentError::IterationBudgetExceeded {
                iterations,
                transcript,
            } => {
                assert_eq!(iterations, 10);
                assert_eq!(transcript.len(), 10);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(scan.calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_parse_errors_are_fed_back() {
        let report = Arc::new(CountingTool::new(ToolName::GenerateReport, "report body"));
        let reasoner = Arc::new(ScriptedReasoner::new(&[
            "I think I should do something.",
            "Action: Lint Everything\nAction Input: x",
            "Action: Generate Report\nAction Input: abc",
            "Final Answer: done",
        ]));

        let agent = agent_with(
            vec![Arc::clone(&report)],
            Arc::clone(&reasoner),
            AgentConfig::default(),
        );
        let outcome = agent.run(&task()).await.unwrap();

        assert_eq!(outcome.answer.text, "done");
        assert_eq!(outcome.transcript.len(), 3);
        assert!(outcome.transcript[0].chosen_tool.is_none());
        assert!(outcome.transcript[0].observation.starts_with("Invalid Format:"));
        assert!(outcome.transcript[1]
            .observation
            .contains("'Lint Everything' is not a valid tool"));
        assert_eq!(outcome.transcript[2].observation, "report body");
        assert_eq!(report.calls.load(Ordering::SeqCst), 1);

        let prompts = reasoner.prompts.lock().unwrap();
        assert!(prompts[1].contains("Observation: Invalid Format:"));
    }

    #[tokio::test]
    async fn test_tool_timeout_is_an_observation() {
        let slow = Arc::new(CountingTool {
            delay: Some(Duration::from_secs(5)),
            ..CountingTool::new(ToolName::SecurityVulnerabilityAnalysis, "never")
        });
        let reasoner = Arc::new(ScriptedReasoner::new(&[
            "Action: Security Vulnerability Analysis\nAction Input: https://github.com/org/repo",
            "Final Answer: the scan timed out",
        ]));

        let agent = agent_with(
            vec![slow],
            reasoner,
            AgentConfig {
                tool_timeout: Duration::from_millis(50),
                ..Default::default()
            },
        );
        let outcome = agent.run(&task()).await.unwrap();

        assert_eq!(outcome.transcript.len(), 1);
        assert!(outcome.transcript[0].observation.contains("timed out"));
        assert_eq!(outcome.answer.text, "the scan timed out");
    }

    #[tokio::test]
    async fn test_immediate_answer_has_empty_transcript() {
        let reasoner = Arc::new(ScriptedReasoner::new(&["Final Answer: nothing to scan"]));
        let agent = agent_with(vec![], reasoner, AgentConfig::default());
        let outcome = agent.run(&task()).await.unwrap();
        assert_eq!(outcome.iterations(), 0);
        tokio_test::assert_ok!(serde_json::to_string(&outcome));
    }

    #[tokio::test]
    async fn test_reasoning_failure_is_fatal() {
        struct Offline;

        #[async_trait]
        impl ReasoningEngine for Offline {
            async fn complete(&self, _prompt: &str) -> Result<String, AgentError> {
                Err(AgentError::Reasoning("offline".to_string()))
            }
        }

        let agent = AnalysisAgent::new(
            AgentConfig::default(),
            Arc::new(ToolRegistry::new()),
            Arc::new(Offline),
        );
        tokio_test::assert_err!(agent.run(&task()).await);
    }

    #[test]
    fn test_agent_config_default() {
        let config = AgentConfig::default();
        assert_eq!(config.max_iterations, 10);
    }
}
