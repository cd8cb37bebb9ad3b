//! The context store.
//!
//! Owns the ordered message log of one session, the single in-flight
//! streaming transaction and the size-triggered summarization that keeps
//! the log within the model's context window.

pub mod history;
pub mod summarize;
pub mod token;

pub use history::{ConversationHistory, StreamingTransaction};
pub use summarize::{ProviderSummarizer, Summarizer, SummaryError};
