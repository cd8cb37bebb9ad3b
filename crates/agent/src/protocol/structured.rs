//! Structured-literal action grammar.
//!
//! The action section holds one JSON object or an array of them:
//!
//! ```text
//! {"name": "read_file", "parameters": {"path": "src/lib.rs"}}
//! ```
//!
//! Markdown code fences around the literal are tolerated, as is `arguments`
//! in place of `parameters` (optionally as a JSON-encoded string).

use forgeloop_core::protocol::{RawParam, ToolCallRequest};
use serde_json::Value;
use tracing::trace;

use super::ActionGrammar;

pub struct StructuredGrammar;

impl ActionGrammar for StructuredGrammar {
    fn parse_calls(&self, section: &str) -> Vec<ToolCallRequest> {
        let body = strip_code_fence(section);
        let Some(start) = body.find(['{', '[']) else {
            return Vec::new();
        };

        // Only the first complete literal counts; trailing prose is ignored.
        let literal = match serde_json::Deserializer::from_str(&body[start..])
            .into_iter::<Value>()
            .next()
        {
            Some(Ok(value)) => value,
            Some(Err(e)) => {
                trace!(error = %e, "Action section is not a valid JSON literal");
                return Vec::new();
            }
            None => return Vec::new(),
        };

        match literal {
            Value::Array(items) => items.iter().filter_map(call_from_value).collect(),
            value => call_from_value(&value).into_iter().collect(),
        }
    }
}

/// Contents of the first fenced block, or the whole text when unfenced.
fn strip_code_fence(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text;
    };
    let after_open = &text[open + 3..];
    // Skip the info string (e.g. `json`) on the opening fence line
    let content_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let content = &after_open[content_start..];
    match content.find("```") {
        Some(close) => &content[..close],
        None => content,
    }
}

fn call_from_value(value: &Value) -> Option<ToolCallRequest> {
    let object = value.as_object()?;
    let name = object.get("name")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }

    let mut call = ToolCallRequest::new(name);
    call.source = value.to_string();

    let params = object.get("parameters").or_else(|| object.get("arguments"));
    let params = match params {
        // Some models encode arguments as a JSON string
        Some(Value::String(encoded)) => serde_json::from_str::<Value>(encoded).ok(),
        other => other.cloned(),
    };

    if let Some(Value::Object(map)) = params {
        for (key, value) in map {
            call.add_param(key, raw_param(value));
        }
    }

    Some(call)
}

fn raw_param(value: Value) -> RawParam {
    match value {
        Value::Array(items) => RawParam::List(items.into_iter().map(text_of).collect()),
        other => RawParam::Text(text_of(other)),
    }
}

/// Strings are taken as-is; anything else keeps its JSON spelling so
/// coercion can restore the type.
fn text_of(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Vec<ToolCallRequest> {
        StructuredGrammar.parse_calls(text)
    }

    #[test]
    fn single_object() {
        let calls = parse(r#"{"name": "read_file", "parameters": {"path": "a.rs", "max_lines": 10}}"#);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "read_file");
        assert_eq!(calls[0].raw_parameters["path"], RawParam::from("a.rs"));
        assert_eq!(calls[0].raw_parameters["max_lines"], RawParam::from("10"));
    }

    #[test]
    fn array_of_calls_in_order() {
        let calls = parse(
            r#"[{"name": "a", "parameters": {}}, {"name": "b", "parameters": {"x": true}}]"#,
        );
        let names: Vec<_> = calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(calls[1].raw_parameters["x"], RawParam::from("true"));
    }

    #[test]
    fn fenced_literal_with_trailing_prose() {
        let text = "```json\n{\"name\": \"shell\", \"arguments\": {\"command\": \"ls\"}}\n```\nThat should list files.";
        let calls = parse(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].raw_parameters["command"], RawParam::from("ls"));
    }

    #[test]
    fn string_encoded_arguments() {
        let calls = parse(r#"{"name": "shell", "arguments": "{\"command\": \"pwd\"}"}"#);
        assert_eq!(calls[0].raw_parameters["command"], RawParam::from("pwd"));
    }

    #[test]
    fn array_values_become_lists() {
        let calls = parse(r#"{"name": "search_files", "parameters": {"paths": ["src", 3]}}"#);
        assert_eq!(
            calls[0].raw_parameters["paths"],
            RawParam::List(vec!["src".into(), "3".into()])
        );
    }

    #[test]
    fn malformed_or_nameless_entries_are_dropped() {
        assert!(parse("{not json").is_empty());
        assert!(parse("no literal at all").is_empty());
        let calls = parse(r#"[{"parameters": {}}, {"name": "ok"}, 42]"#);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "ok");
    }
}
