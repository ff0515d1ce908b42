//! Prompt rendering for the THINKING step.

use crate::agent::tools::ToolRegistry;
use crate::models::{AgentStep, AnalysisTask};

const PROMPT_TEMPLATE: &str = r#"**Instructions**:
- Create an analytical report based on the selected output format and provide it as the final answer.

Answer the following question as best you can. You have access to the following tools:

{tools}

Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do. Do not generate the report here.
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know what to do. I will generate the report.
Final Answer: the final answer to the original input question, which includes the formatted report

Begin!

Question: {input}
Selected Tool: {selected_tool}
Directory: {directory}
Credential: {credential}
Branch: {branch}
Report Format Type: {output_format}
Report Language: {output_language}
Thought:{scratchpad}"#;

/// Render the prompt for the next THINKING step.
///
/// Observations longer than `max_observation_chars` are shortened in the
/// prompt only; the transcript keeps them whole.
pub fn render_prompt(
    task: &AnalysisTask,
    registry: &ToolRegistry,
    transcript: &[AgentStep],
    max_observation_chars: usize,
) -> String {
    let selected_tool = task
        .selected_tool()
        .map(|t| t.as_str())
        .unwrap_or("(choose the most suitable tool)");
    let credential = if task.credential().is_some() {
        "provided (leave the token field empty to use it)"
    } else {
        "none"
    };

    PROMPT_TEMPLATE
        .replace("{tools}", &registry.describe())
        .replace("{tool_names}", &registry.tool_names())
        .replace("{input}", task.repository_url())
        .replace("{selected_tool}", selected_tool)
        .replace("{directory}", task.directory())
        .replace("{credential}", credential)
        .replace("{branch}", task.branch())
        .replace("{output_format}", &task.output_format().to_string())
        .replace("{output_language}", &task.output_language().to_string())
        .replace(
            "{scratchpad}",
            &render_scratchpad(transcript, max_observation_chars),
        )
}

/// Replay earlier steps in the same layout the model is asked to write.
pub fn render_scratchpad(transcript: &[AgentStep], max_observation_chars: usize) -> String {
    let mut pad = String::new();
    for step in transcript {
        let observation = truncate(&step.observation, max_observation_chars);
        match step.chosen_tool {
            Some(tool) => pad.push_str(&format!(
                " {}\nAction: {}\nAction Input: {}\nObservation: {}\nThought:",
                step.thought, tool, step.action_input, observation
            )),
            None => pad.push_str(&format!(
                " {}\nObservation: {}\nThought:",
                step.thought, observation
            )),
        }
    }
    pad
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!(
            "{}\n... [truncated {} characters]",
            &text[..cut],
            text[cut..].chars().count()
        ),
        None => text.to_string(),
    }
}
