//! Messages fed back to the model after tool execution.
//!
//! Tool errors never end a turn. They come back to the model as a user-role
//! message, and the model decides whether and how to retry.

use forgeloop_core::protocol::ToolCallRequest;

use crate::dispatch::{ParallelOutcome, ToolExecutionOutcome};

const RETRY_INSTRUCTION: &str = "Retry the same tool with corrected parameters, \
unless it is fundamentally unsuitable for this task, in which case choose a different approach.";

/// Result of a successful single call.
pub fn tool_success(outcome: &ToolExecutionOutcome) -> String {
    format!(
        "Tool '{}' returned:\n{}",
        outcome.tool_name,
        outcome.result.as_deref().unwrap_or_default()
    )
}

/// Error report for a failed single call, quoting the call verbatim.
pub fn tool_failure(outcome: &ToolExecutionOutcome, call: &ToolCallRequest) -> String {
    format!(
        "Tool '{}' failed with error: {}\n\n{RETRY_INSTRUCTION}\n\nFailed call:\n{}",
        outcome.tool_name,
        outcome.error.as_deref().unwrap_or("unknown error"),
        call_text(call)
    )
}

/// One message covering every call of a parallel batch.
pub fn parallel_report(outcome: &ParallelOutcome) -> String {
    let mut out = String::new();

    if outcome.success {
        out.push_str(&format!("All {} tools succeeded.\n", outcome.results.len()));
    } else {
        out.push_str(&format!(
            "{} of {} tools failed.\n",
            outcome.errors.len(),
            outcome.results.len() + outcome.errors.len()
        ));
    }

    for (name, result) in &outcome.results {
        out.push_str(&format!("\n[{name}] succeeded:\n{result}\n"));
    }
    for (name, error) in &outcome.errors {
        out.push_str(&format!("\n[{name}] failed: {error}\n"));
    }

    if !outcome.success {
        out.push_str(&format!(
            "\nThe successful results above are valid. For each failed tool: {RETRY_INSTRUCTION}"
        ));
    }

    out.trim_end().to_string()
}

/// The call as the model wrote it, or a reconstruction when the parser kept
/// no source text.
fn call_text(call: &ToolCallRequest) -> String {
    if !call.source.is_empty() {
        return call.source.clone();
    }
    serde_json::json!({ "name": call.name, "parameters": call.raw_parameters }).to_string()
}
