//! Conversation history with a streaming-token transaction.

use std::sync::Arc;

use forgeloop_core::agent::SummarizationPolicy;
use forgeloop_core::error::ConversationError;
use forgeloop_core::message::{Message, Role};
use tracing::{debug, info, warn};

use super::summarize::Summarizer;
use super::token::estimate_messages_tokens;

/// Model output accumulated for the current iteration but not yet part of
/// the history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamingTransaction {
    buffer: String,
}

impl StreamingTransaction {
    pub fn buffer(&self) -> &str {
        &self.buffer
    }
}

/// Ordered message log of one session.
///
/// Mutation happens only through [`add_message`](Self::add_message),
/// [`add_system_message`](Self::add_system_message), the streaming
/// transaction, summarization and [`clear`](Self::clear).
pub struct ConversationHistory {
    messages: Vec<Message>,
    transaction: Option<StreamingTransaction>,
    summarizer: Option<Arc<dyn Summarizer>>,
    policy: SummarizationPolicy,
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConversationHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationHistory")
            .field("messages", &self.messages.len())
            .field("transaction", &self.transaction)
            .field("summarizer", &self.summarizer.is_some())
            .field("policy", &self.policy)
            .finish()
    }
}

impl ConversationHistory {
    /// An empty history that never summarizes.
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            transaction: None,
            summarizer: None,
            policy: SummarizationPolicy::default(),
        }
    }

    /// Enable size-triggered summarization.
    pub fn with_summarizer(
        mut self,
        summarizer: Arc<dyn Summarizer>,
        policy: SummarizationPolicy,
    ) -> Self {
        self.summarizer = Some(summarizer);
        self.policy = policy;
        self
    }

    /// Append a message. A system message is routed to
    /// [`add_system_message`](Self::add_system_message).
    ///
    /// Runs summarization afterwards when the estimated size exceeds the
    /// policy threshold. Summarization failures are logged, never returned.
    pub async fn add_message(&mut self, role: Role, content: impl Into<String>) {
        if role == Role::System {
            self.add_system_message(content);
            return;
        }
        self.messages.push(Message::new(role, content));
        self.compact_if_needed().await;
    }

    /// Replace the leading system message, or insert one at the head.
    pub fn add_system_message(&mut self, content: impl Into<String>) {
        let content = content.into();
        if let Some(first) = self.messages.first_mut().filter(|m| m.role == Role::System) {
            first.content = content;
        } else {
            self.messages.insert(0, Message::system(content));
        }
    }

    /// A copy of the message log.
    pub fn history(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_user_message(&self) -> Option<&Message> {
        self.last_with_role(Role::User)
    }

    pub fn last_assistant_message(&self) -> Option<&Message> {
        self.last_with_role(Role::Assistant)
    }

    fn last_with_role(&self, role: Role) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == role)
    }

    /// Drop everything except the system message. Any open transaction is
    /// discarded.
    pub fn clear(&mut self) {
        self.transaction = None;
        self.messages.retain(|m| m.role == Role::System);
    }

    // --- Streaming transaction ---

    pub fn start_append_token(&mut self) -> Result<(), ConversationError> {
        if self.transaction.is_some() {
            return Err(ConversationError::TransactionAlreadyActive);
        }
        self.transaction = Some(StreamingTransaction::default());
        Ok(())
    }

    pub fn append_token(&mut self, fragment: &str) -> Result<(), ConversationError> {
        let tx = self
            .transaction
            .as_mut()
            .ok_or(ConversationError::NoActiveTransaction)?;
        tx.buffer.push_str(fragment);
        Ok(())
    }

    /// Move the buffer into history: extend a trailing assistant message, or
    /// create one when the buffer is non-empty.
    pub fn commit_append_token(&mut self) -> Result<(), ConversationError> {
        let tx = self
            .transaction
            .take()
            .ok_or(ConversationError::NoActiveTransaction)?;

        if let Some(last) = self.messages.last_mut().filter(|m| m.role == Role::Assistant) {
            last.content.push_str(&tx.buffer);
        } else if !tx.buffer.is_empty() {
            self.messages.push(Message::assistant(tx.buffer));
        }
        Ok(())
    }

    /// Discard the buffer without touching history.
    pub fn cancel_append_token(&mut self) -> Result<(), ConversationError> {
        let tx = self
            .transaction
            .take()
            .ok_or(ConversationError::NoActiveTransaction)?;
        debug!(discarded = tx.buffer.len(), "Streaming transaction cancelled");
        Ok(())
    }

    pub fn is_streaming(&self) -> bool {
        self.transaction.is_some()
    }

    /// Text accumulated by the open transaction, if any.
    pub fn pending_buffer(&self) -> Option<&str> {
        self.transaction.as_ref().map(StreamingTransaction::buffer)
    }

    // --- Summarization ---

    /// Summarize the oldest messages when the history is over budget.
    /// Returns whether history was rebuilt.
    pub async fn compact_if_needed(&mut self) -> bool {
        let Some(summarizer) = self.summarizer.clone() else {
            return false;
        };

        let estimated = estimate_messages_tokens(&self.messages);
        if estimated <= self.policy.max_context_tokens {
            return false;
        }

        let offset = usize::from(
            self.messages
                .first()
                .is_some_and(|m| m.role == Role::System),
        );
        let count = self.policy.summarize_count(self.messages.len() - offset);
        if count == 0 {
            return false;
        }

        let older = &self.messages[offset..offset + count];
        let transcript = older
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n\n");

        let summary = match summarizer
            .summarize(
                &transcript,
                self.policy.compression,
                self.policy.summary_max_tokens,
            )
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, estimated, "Summarization failed, keeping full history");
                return false;
            }
        };

        let mut rebuilt = Vec::with_capacity(self.messages.len() - count + 1);
        if offset == 1 {
            rebuilt.push(self.messages[0].clone());
        }
        rebuilt.push(Message::user(format!(
            "[{count} messages compressed]: {summary}"
        )));
        rebuilt.extend(self.messages.drain(offset + count..));
        self.messages = rebuilt;

        info!(
            compressed = count,
            before_tokens = estimated,
            after_tokens = estimate_messages_tokens(&self.messages),
            "Conversation history summarized"
        );
        true
    }
}
