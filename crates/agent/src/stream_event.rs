//! Agent-level streaming events.
//!
//! `AgentStreamEvent` lifts provider-level stream chunks and loop decisions
//! into events a presentation layer can render as they happen.

use forgeloop_core::provider::Usage;
use serde::{Deserialize, Serialize};

/// Events emitted by the agent loop during a turn.
///
/// - `chunk`       — partial text token from the model
/// - `tool_call`   — the loop is invoking a tool
/// - `tool_result` — tool execution completed
/// - `thought`     — reasoning section of a parsed response
/// - `done`        — the turn ended with a final answer or the iteration limit
/// - `cancelled`   — the turn was cancelled
/// - `error`       — the turn failed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    /// Partial text token from the model.
    Chunk { content: String },

    /// The loop is calling a tool.
    ToolCall {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Tool execution completed.
    ToolResult {
        id: String,
        name: String,
        output: String,
        success: bool,
    },

    /// Reasoning extracted from the model's response.
    Thought { content: String },

    /// The turn is complete.
    Done {
        usage: Option<Usage>,
        iterations: usize,
        tool_calls_made: usize,
    },

    /// The turn was cancelled; partial output was discarded.
    Cancelled { iterations: usize },

    /// An error ended the turn.
    Error { message: String },
}

impl AgentStreamEvent {
    /// Event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Thought { .. } => "thought",
            Self::Done { .. } => "done",
            Self::Cancelled { .. } => "cancelled",
            Self::Error { .. } => "error",
        }
    }
}
