//! Tag-delimited action grammar.
//!
//! ```text
//! <search_files>
//! <pattern>fn main</pattern>
//! <paths>src</paths>
//! <paths>tests</paths>
//! </search_files>
//! ```
//!
//! Each top-level block is one call; each child element is one parameter.
//! A parameter repeated inside a block collects into a list.

use forgeloop_core::protocol::{RawParam, ToolCallRequest};
use regex_lite::Regex;

use super::ActionGrammar;

pub struct TaggedGrammar {
    open_tag: Regex,
}

impl TaggedGrammar {
    pub fn new() -> Self {
        Self {
            open_tag: Regex::new(r"<([A-Za-z_][A-Za-z0-9_.\-]*)>")
                .expect("static tag pattern is valid"),
        }
    }

    /// Iterate `(name, body, whole_element)` for each complete top-level
    /// element in `text`. Scanning stops at the first unclosed element: its
    /// contents are never read as elements of their own.
    fn elements<'t>(&self, text: &'t str) -> Vec<(&'t str, &'t str, &'t str)> {
        let mut found = Vec::new();
        let mut pos = 0;

        while let Some(caps) = self.open_tag.captures(&text[pos..]) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                break;
            };
            let start = pos + whole.start();
            let body_start = pos + whole.end();
            let name = &text[pos + name.start()..pos + name.end()];

            let closing = format!("</{name}>");
            match text[body_start..].find(&closing) {
                Some(rel) => {
                    let body_end = body_start + rel;
                    let end = body_end + closing.len();
                    found.push((name, &text[body_start..body_end], &text[start..end]));
                    pos = end;
                }
                None => break,
            }
        }

        found
    }
}

impl Default for TaggedGrammar {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionGrammar for TaggedGrammar {
    fn parse_calls(&self, section: &str) -> Vec<ToolCallRequest> {
        self.elements(section)
            .into_iter()
            .map(|(name, body, source)| {
                let mut call = ToolCallRequest::new(name);
                call.source = source.to_string();
                for (param, value, _) in self.elements(body) {
                    let value = value.trim_matches(|c| c == '\n' || c == '\r');
                    call.add_param(param.to_string(), RawParam::Text(value.to_string()));
                }
                call
            })
            .collect()
    }
}
