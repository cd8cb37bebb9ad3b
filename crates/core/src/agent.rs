//! Agent configuration types.

use serde::{Deserialize, Serialize};

/// Upper bound accepted for `max_iterations`.
pub const MAX_ITERATIONS_CEILING: u32 = 100;

/// Default context size (in estimated tokens) above which older messages
/// are summarized.
pub const DEFAULT_MAX_CONTEXT_TOKENS: usize = 24_000;

/// Default share of the non-system history kept verbatim when summarizing.
pub const DEFAULT_KEEP_RECENT_RATIO: f32 = 0.25;

/// Configuration for the agent's behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum model calls per turn (safety limit)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// How the model encodes tool calls in its action section
    #[serde(default)]
    pub action_encoding: ActionEncoding,
}

fn default_max_iterations() -> u32 {
    25
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            action_encoding: ActionEncoding::default(),
        }
    }
}

/// The grammar used inside the action section of a response.
///
/// A deployment commits to exactly one encoding; the parser is built for it
/// once and never guesses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionEncoding {
    /// `<tool><param>value</param></tool>` blocks
    #[default]
    Tagged,
    /// A JSON `{"name": …, "parameters": {…}}` object or an array of them
    Structured,
}

/// How hard the summarizer should compress older history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionLevel {
    /// Keep most detail, drop only redundancy
    Light,
    /// Keep decisions, results and open tasks
    #[default]
    Balanced,
    /// Keep only decisions, file paths and open tasks
    Aggressive,
}

/// When and how the context store compresses its history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizationPolicy {
    /// Estimated token count above which summarization runs
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    /// Share of non-system messages kept verbatim (the newest ones)
    #[serde(default = "default_keep_recent_ratio")]
    pub keep_recent_ratio: f32,

    /// Summarizer prompt selection
    #[serde(default)]
    pub compression: CompressionLevel,

    /// Cap on the summary length, in tokens
    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,
}

fn default_max_context_tokens() -> usize {
    DEFAULT_MAX_CONTEXT_TOKENS
}
fn default_keep_recent_ratio() -> f32 {
    DEFAULT_KEEP_RECENT_RATIO
}
fn default_summary_max_tokens() -> u32 {
    1024
}

impl Default for SummarizationPolicy {
    fn default() -> Self {
        Self {
            max_context_tokens: default_max_context_tokens(),
            keep_recent_ratio: default_keep_recent_ratio(),
            compression: CompressionLevel::default(),
            summary_max_tokens: default_summary_max_tokens(),
        }
    }
}

impl SummarizationPolicy {
    /// Number of leading messages (out of `total`) that get summarized.
    pub fn summarize_count(&self, total: usize) -> usize {
        let keep = (total as f32 * self.keep_recent_ratio).ceil() as usize;
        total.saturating_sub(keep.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.max_iterations, 25);
        assert_eq!(config.action_encoding, ActionEncoding::Tagged);
        assert_eq!(CompressionLevel::default(), CompressionLevel::Balanced);
    }

    #[test]
    fn encoding_deserializes_snake_case() {
        let config: AgentConfig =
            serde_json::from_str(r#"{"action_encoding":"structured"}"#).unwrap();
        assert_eq!(config.action_encoding, ActionEncoding::Structured);
        assert_eq!(config.max_iterations, 25);
    }

    #[test]
    fn split_keeps_newest_quarter() {
        let policy = SummarizationPolicy::default();
        assert_eq!(policy.summarize_count(8), 6);
        assert_eq!(policy.summarize_count(10), 7);
        assert_eq!(policy.summarize_count(1), 0);
        assert_eq!(policy.summarize_count(0), 0);
    }
}
