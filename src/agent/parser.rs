//! Parsing of the reasoning step's free-text output.
//!
//! The model answers in the `Thought / Action / Action Input` or
//! `Thought / Final Answer` layout. Labels are matched case-insensitively at
//! the start of a line until a `Final Answer:` begins; everything after that
//! belongs to the answer. Before it, anything after a model-written
//! `Observation:` is discarded because observations only come from tool runs.

use crate::error::ParseError;

/// What the reasoning step decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Run a tool. `tool` is unvalidated; the registry checks it.
    Act {
        thought: String,
        tool: String,
        input: String,
    },
    Finish {
        thought: String,
        answer: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Thought,
    Action,
    ActionInput,
    FinalAnswer,
    Observation,
}

// Longest prefixes first so "Action Input:" is not read as "Action:".
const LABELS: [(&str, Label); 5] = [
    ("final answer:", Label::FinalAnswer),
    ("action input:", Label::ActionInput),
    ("observation:", Label::Observation),
    ("thought:", Label::Thought),
    ("action:", Label::Action),
];

fn split_label(line: &str) -> Option<(Label, &str)> {
    let line = line.trim_start().trim_start_matches(['*', '#', '-', ' ']);
    LABELS.iter().find_map(|(prefix, label)| {
        let head = line.get(..prefix.len())?;
        if !head.eq_ignore_ascii_case(prefix) {
            return None;
        }
        let rest = line[prefix.len()..].trim_start_matches('*');
        Some((*label, rest))
    })
}

#[derive(Default)]
struct Sections {
    thought: Vec<String>,
    action: Option<Vec<String>>,
    action_input: Option<Vec<String>>,
    final_answer: Option<Vec<String>>,
}

impl Sections {
    fn slot(&mut self, label: Label) -> &mut Vec<String> {
        match label {
            Label::Thought | Label::Observation => &mut self.thought,
            Label::Action => self.action.get_or_insert_with(Vec::new),
            Label::ActionInput => self.action_input.get_or_insert_with(Vec::new),
            Label::FinalAnswer => self.final_answer.get_or_insert_with(Vec::new),
        }
    }
}

fn join(lines: &[String]) -> String {
    lines.join("\n").trim().to_string()
}

/// Parse one reasoning response.
pub fn parse_response(text: &str) -> Result<Decision, ParseError> {
    let mut sections = Sections::default();
    let mut current = Label::Thought;

    for line in text.lines() {
        // The answer runs to the end; report text may look like labels.
        if current == Label::FinalAnswer {
            sections.slot(current).push(line.to_string());
            continue;
        }
        match split_label(line) {
            Some((Label::Observation, _)) => break,
            Some((label, rest)) => {
                current = label;
                sections.slot(label).push(rest.to_string());
            }
            None => sections.slot(current).push(line.to_string()),
        }
    }

    let thought = join(&sections.thought);
    let action = sections
        .action
        .as_deref()
        .map(join)
        .filter(|a| !a.is_empty());

    match (action, sections.final_answer.as_deref()) {
        (Some(_), Some(_)) => Err(ParseError::Ambiguous),
        (None, Some(answer)) => {
            let answer = join(answer);
            if answer.is_empty() {
                Err(ParseError::EmptyAnswer)
            } else {
                Ok(Decision::Finish { thought, answer })
            }
        }
        (Some(action), None) => {
            let tool = action.lines().next().unwrap_or_default().trim().to_string();
            let input = sections
                .action_input
                .as_deref()
                .map(join)
                .filter(|i| !i.is_empty())
                .ok_or_else(|| ParseError::MissingActionInput(tool.clone()))?;
            Ok(Decision::Act {
                thought,
                tool,
                input,
            })
        }
        (None, None) => Err(ParseError::MissingAction),
    }
}
