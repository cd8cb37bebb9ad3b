//! Values produced by the response protocol parser.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A raw, textual argument value as written by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawParam {
    Text(String),
    List(Vec<String>),
}

impl RawParam {
    /// Add another occurrence of the same parameter, turning a single value
    /// into a list.
    pub fn push(&mut self, value: String) {
        match self {
            RawParam::Text(first) => {
                let first = std::mem::take(first);
                *self = RawParam::List(vec![first, value]);
            }
            RawParam::List(items) => items.push(value),
        }
    }
}

impl From<&str> for RawParam {
    fn from(value: &str) -> Self {
        RawParam::Text(value.to_string())
    }
}

impl From<String> for RawParam {
    fn from(value: String) -> Self {
        RawParam::Text(value)
    }
}

impl From<Vec<String>> for RawParam {
    fn from(value: Vec<String>) -> Self {
        RawParam::List(value)
    }
}

/// A parsed, not yet type-checked request to invoke a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,

    pub raw_parameters: BTreeMap<String, RawParam>,

    /// The exact text the call was parsed from.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_parameters: BTreeMap::new(),
            source: String::new(),
        }
    }

    /// Builder-style parameter insertion. Repeating a name collects the
    /// values into a list.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<RawParam>) -> Self {
        self.add_param(name.into(), value.into());
        self
    }

    pub fn add_param(&mut self, name: String, value: RawParam) {
        match (self.raw_parameters.get_mut(&name), value) {
            (Some(existing), RawParam::Text(v)) => existing.push(v),
            (Some(existing), RawParam::List(vs)) => {
                for v in vs {
                    existing.push(v);
                }
            }
            (None, value) => {
                self.raw_parameters.insert(name, value);
            }
        }
    }
}

/// One or several tool calls requested in a single response.
#[derive(Debug, Clone, PartialEq)]
pub enum Actions {
    Single(ToolCallRequest),
    Multiple(Vec<ToolCallRequest>),
}

impl Actions {
    /// Collapse a list of calls: none → `None`, one → `Single`, more → `Multiple`.
    pub fn from_calls(mut calls: Vec<ToolCallRequest>) -> Option<Self> {
        match calls.len() {
            0 => None,
            1 => calls.pop().map(Actions::Single),
            _ => Some(Actions::Multiple(calls)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Actions::Single(_) => 1,
            Actions::Multiple(calls) => calls.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn calls(&self) -> Vec<&ToolCallRequest> {
        match self {
            Actions::Single(call) => vec![call],
            Actions::Multiple(calls) => calls.iter().collect(),
        }
    }
}

/// Structured view of one assistant response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    pub reasoning: Option<String>,
    pub actions: Option<Actions>,
    pub final_answer: Option<String>,
}

impl ParsedResponse {
    /// A response is terminal when it requests no action. An action always
    /// wins over a final answer written in the same response.
    pub fn is_terminal(&self) -> bool {
        self.actions.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_params_collect_into_list() {
        let call = ToolCallRequest::new("search_files")
            .with_param("paths", "src")
            .with_param("paths", "tests")
            .with_param("paths", "benches");
        assert_eq!(
            call.raw_parameters["paths"],
            RawParam::List(vec!["src".into(), "tests".into(), "benches".into()])
        );
    }

    #[test]
    fn actions_multiplicity() {
        assert!(Actions::from_calls(vec![]).is_none());
        let single = Actions::from_calls(vec![ToolCallRequest::new("a")]).unwrap();
        assert!(matches!(single, Actions::Single(_)));
        let many = Actions::from_calls(vec![ToolCallRequest::new("a"), ToolCallRequest::new("b")])
            .unwrap();
        assert_eq!(many.len(), 2);
        assert_eq!(many.calls()[1].name, "b");
    }

    #[test]
    fn action_beats_final_answer() {
        let parsed = ParsedResponse {
            reasoning: None,
            actions: Actions::from_calls(vec![ToolCallRequest::new("a")]),
            final_answer: Some("done".into()),
        };
        assert!(!parsed.is_terminal());
    }
}
