//! Response protocol parsing.
//!
//! The model answers in up to three sections, each introduced by a header at
//! the start of a line:
//!
//! ```text
//! Thought: what I am about to do and why
//! Action: <tool calls in the deployment's encoding>
//! Final Answer: text for the user
//! ```
//!
//! A section runs until the next header or the end of the text. The action
//! section is handed to an [`ActionGrammar`], picked once from the configured
//! [`ActionEncoding`].

pub mod structured;
pub mod tagged;

use forgeloop_core::agent::ActionEncoding;
use forgeloop_core::protocol::{Actions, ParsedResponse, ToolCallRequest};

pub use structured::StructuredGrammar;
pub use tagged::TaggedGrammar;

/// Extracts tool calls from the body of an action section.
pub trait ActionGrammar: Send + Sync {
    /// Calls in source order. Malformed fragments are skipped.
    fn parse_calls(&self, section: &str) -> Vec<ToolCallRequest>;
}

/// Header keywords, matched case-insensitively at the start of a line.
const THOUGHT_HEADER: &str = "thought:";
const ACTION_HEADER: &str = "action:";
const FINAL_ANSWER_HEADER: &str = "final answer:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Thought,
    Action,
    FinalAnswer,
}

/// Splits assistant text into sections and parses the action section.
pub struct ResponseParser {
    grammar: Box<dyn ActionGrammar>,
}

impl std::fmt::Debug for ResponseParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseParser").finish_non_exhaustive()
    }
}

impl ResponseParser {
    pub fn new(encoding: ActionEncoding) -> Self {
        match encoding {
            ActionEncoding::Tagged => Self::with_grammar(Box::new(TaggedGrammar::new())),
            ActionEncoding::Structured => Self::with_grammar(Box::new(StructuredGrammar)),
        }
    }

    pub fn with_grammar(grammar: Box<dyn ActionGrammar>) -> Self {
        Self { grammar }
    }

    /// Parse one iteration's accumulated output.
    ///
    /// Returns `None` when the text contains none of the three headers.
    pub fn parse(&self, text: &str) -> Option<ParsedResponse> {
        let sections = split_sections(text);
        if sections.is_empty() {
            return None;
        }

        let mut reasoning: Vec<&str> = Vec::new();
        let mut action: Vec<&str> = Vec::new();
        let mut final_answer: Vec<&str> = Vec::new();
        for (section, body) in &sections {
            match section {
                Section::Thought => reasoning.push(body),
                Section::Action => action.push(body),
                Section::FinalAnswer => final_answer.push(body),
            }
        }

        let calls = action
            .iter()
            .flat_map(|body| self.grammar.parse_calls(body))
            .collect();

        Some(ParsedResponse {
            reasoning: join_non_empty(&reasoning),
            actions: Actions::from_calls(calls),
            final_answer: join_non_empty(&final_answer),
        })
    }
}

fn join_non_empty(parts: &[&str]) -> Option<String> {
    let joined = parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    (!joined.is_empty()).then_some(joined)
}

/// Match a header at the start of `line`, returning the section and the text
/// after the colon.
fn header(line: &str) -> Option<(Section, &str)> {
    let trimmed = line.trim_start();
    let lower = trimmed.to_ascii_lowercase();
    [
        (THOUGHT_HEADER, Section::Thought),
        (ACTION_HEADER, Section::Action),
        (FINAL_ANSWER_HEADER, Section::FinalAnswer),
    ]
    .into_iter()
    .find(|(keyword, _)| lower.starts_with(keyword))
    .map(|(keyword, section)| (section, &trimmed[keyword.len()..]))
}

/// Section bodies in source order. Text before the first header is dropped.
fn split_sections(text: &str) -> Vec<(Section, String)> {
    let mut sections: Vec<(Section, String)> = Vec::new();

    for line in text.lines() {
        if let Some((section, rest)) = header(line) {
            sections.push((section, rest.to_string()));
        } else if let Some((_, body)) = sections.last_mut() {
            body.push('\n');
            body.push_str(line);
        }
    }

    sections
}
