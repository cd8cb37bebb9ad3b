//! Summarization of older conversation turns.

use std::sync::Arc;

use async_trait::async_trait;
use forgeloop_core::agent::CompressionLevel;
use forgeloop_core::error::ProviderError;
use forgeloop_core::message::Message;
use forgeloop_core::provider::{Provider, ProviderRequest};
use tracing::debug;

/// Why a summary could not be produced. Never surfaced past the context
/// store; it only decides whether history gets rebuilt.
#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("summarizer call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("summarizer returned an empty summary")]
    Empty,
}

/// Compresses a role-prefixed transcript into a short summary.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        transcript: &str,
        level: CompressionLevel,
        max_tokens: u32,
    ) -> Result<String, SummaryError>;
}

/// Summarizer backed by a non-streaming model call.
pub struct ProviderSummarizer {
    provider: Arc<dyn Provider>,
    model: String,
}

impl ProviderSummarizer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    fn instructions(level: CompressionLevel) -> &'static str {
        match level {
            CompressionLevel::Light => {
                "Summarize the following conversation between a user and a coding assistant. \
                 Keep most of the detail: requests, reasoning, tool calls with their important \
                 results, file paths and decisions. Remove only repetition and filler."
            }
            CompressionLevel::Balanced => {
                "Summarize the following conversation between a user and a coding assistant. \
                 Keep the user's goals, decisions made, key tool results, file paths touched and \
                 any open tasks. Drop intermediate reasoning and verbose tool output."
            }
            CompressionLevel::Aggressive => {
                "Compress the following conversation between a user and a coding assistant into \
                 a terse list. Keep only decisions, file paths and open tasks. Omit everything else."
            }
        }
    }
}

#[async_trait]
impl Summarizer for ProviderSummarizer {
    async fn summarize(
        &self,
        transcript: &str,
        level: CompressionLevel,
        max_tokens: u32,
    ) -> Result<String, SummaryError> {
        let mut request = ProviderRequest::new(
            self.model.clone(),
            vec![
                Message::system(Self::instructions(level)),
                Message::user(transcript),
            ],
        );
        request.temperature = 0.0;
        request.max_tokens = Some(max_tokens);

        debug!(?level, max_tokens, chars = transcript.len(), "Requesting summary");

        let response = self.provider.complete(request).await?;
        let summary = response.message.content.trim().to_string();
        if summary.is_empty() {
            return Err(SummaryError::Empty);
        }
        Ok(summary)
    }
}
