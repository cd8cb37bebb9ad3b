//! System prompt generation.

use forgeloop_core::agent::ActionEncoding;
use forgeloop_core::tool::ToolRegistry;

const DEFAULT_PREAMBLE: &str = "You are Forgeloop, an autonomous coding assistant. \
You solve the user's request by reasoning step by step and calling tools to inspect \
and change their workspace.";

/// Build the system prompt that teaches the model the response protocol
/// and lists every registered tool.
pub fn build_system_prompt(
    preamble: Option<&str>,
    registry: &ToolRegistry,
    encoding: ActionEncoding,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(preamble.unwrap_or(DEFAULT_PREAMBLE).trim());
    prompt.push_str("\n\n## Response format\n\n");
    prompt.push_str(
        "Structure every response with these sections, each starting at the beginning of a line:\n\n\
         Thought: your reasoning about what to do next\n\
         Action: one or more tool calls (omit when you are done)\n\
         Final Answer: your answer to the user (only when no more tools are needed)\n\n\
         After an Action, stop and wait: the tool results arrive in the next message. \
         If a response contains an Action, any Final Answer in it is ignored.\n",
    );

    prompt.push_str("\n## Tool call syntax\n\n");
    prompt.push_str(match encoding {
        ActionEncoding::Tagged => {
            "Write each call as an XML-style block named after the tool, with one child \
             element per parameter. Repeat an element to pass several values for an array \
             parameter. Several blocks in one Action run in parallel.\n\n\
             Action:\n<read_file>\n<path>src/main.rs</path>\n<max_lines>50</max_lines>\n</read_file>\n"
        }
        ActionEncoding::Structured => {
            "Write the Action as one JSON object {\"name\": ..., \"parameters\": {...}}, or a \
             JSON array of such objects to run several tools in parallel.\n\n\
             Action: {\"name\": \"read_file\", \"parameters\": {\"path\": \"src/main.rs\", \"max_lines\": 50}}\n"
        }
    });

    prompt.push_str("\n## Tools\n");
    if registry.is_empty() {
        prompt.push_str("\nNo tools are available. Answer directly.\n");
    }
    for tool in registry.iter() {
        prompt.push_str(&format!("\n### {}\n{}\n", tool.name(), tool.description()));
        let params = tool.parameters();
        if params.is_empty() {
            prompt.push_str("Parameters: none\n");
            continue;
        }
        prompt.push_str("Parameters:\n");
        for spec in params.iter() {
            let mut line = format!(
                "- {} ({}, {})",
                spec.name,
                spec.ty,
                if spec.required { "required" } else { "optional" }
            );
            if let Some(default) = &spec.default {
                line.push_str(&format!(", default {default}"));
            }
            if !spec.description.is_empty() {
                line.push_str(&format!(": {}", spec.description));
            }
            prompt.push_str(&line);
            prompt.push('\n');
        }
    }

    prompt
}
