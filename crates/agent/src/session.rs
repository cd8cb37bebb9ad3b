//! A conversation bound to one agent loop.
//!
//! `Session` is what a presentation layer holds: it serializes turns, owns
//! the cancellation token of the running turn and exposes a consistent
//! snapshot of the conversation for rendering.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use forgeloop_core::error::{ConversationError, Error};
use forgeloop_core::message::Message;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::context::ConversationHistory;
use crate::loop_runner::{AgentLoop, TurnOutcome};
use crate::prompt::build_system_prompt;

/// Read-only view of the conversation for rendering.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Committed messages, system message first
    pub messages: Vec<Message>,
    /// Text streamed so far in the current model call
    pub pending: Option<String>,
    pub is_streaming: bool,
    /// A turn is running and may be cancelled
    pub is_cancellable: bool,
    /// Cancellation was requested and the turn has not yet stopped
    pub cancel_requested: bool,
}

pub struct Session {
    agent: Arc<AgentLoop>,
    history: Arc<RwLock<ConversationHistory>>,
    cancel: Mutex<CancellationToken>,
    busy: AtomicBool,
}

impl Session {
    /// Start a conversation seeded with the generated system prompt.
    pub fn new(agent: AgentLoop, history: ConversationHistory, preamble: Option<&str>) -> Self {
        let mut history = history;
        history.add_system_message(build_system_prompt(
            preamble,
            agent.registry(),
            agent.action_encoding(),
        ));

        Self {
            agent: Arc::new(agent),
            history: Arc::new(RwLock::new(history)),
            cancel: Mutex::new(CancellationToken::new()),
            busy: AtomicBool::new(false),
        }
    }

    pub fn agent(&self) -> &AgentLoop {
        &self.agent
    }

    /// Run one user turn. Only one turn may run at a time.
    pub async fn submit(&self, text: &str) -> forgeloop_core::Result<TurnOutcome> {
        let token = CancellationToken::new();
        {
            // Busy and the token change together under the cancel lock, so a
            // cancel that sees the turn as busy always reaches its token.
            let mut current = self.lock_cancel();
            if self
                .busy
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return Err(Error::Conversation(ConversationError::TurnInProgress));
            }
            *current = token.clone();
        }
        let _guard = BusyGuard(&self.busy);

        debug!(chars = text.len(), "Submitting turn");
        self.agent.run_turn(&self.history, text, &token).await
    }

    /// Ask the running turn to stop. Returns `false` when no turn is running.
    pub fn request_cancel(&self) -> bool {
        let current = self.lock_cancel();
        if !self.busy.load(Ordering::Acquire) {
            return false;
        }
        info!("Cancellation requested");
        current.cancel();
        true
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let history = self.history.read().await;
        let busy = self.is_busy();
        SessionSnapshot {
            messages: history.history(),
            pending: history.pending_buffer().map(str::to_string),
            is_streaming: history.is_streaming(),
            is_cancellable: busy,
            cancel_requested: busy && self.lock_cancel().is_cancelled(),
        }
    }

    /// Drop everything but the system prompt. Refused while a turn runs.
    pub async fn reset(&self) -> forgeloop_core::Result<()> {
        if self.is_busy() {
            return Err(Error::Conversation(ConversationError::TurnInProgress));
        }
        self.history.write().await.clear();
        Ok(())
    }

    fn lock_cancel(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        // The token is replaced whole, so a poisoned lock still holds a valid one
        self.cancel
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{RecordingTool, ScriptedProvider, SlowTool, Step};
    use forgeloop_core::message::Role;
    use forgeloop_core::tool::ToolRegistry;

    fn session(steps: Vec<Step>, registry: ToolRegistry) -> Session {
        let agent = AgentLoop::new(
            Arc::new(ScriptedProvider::new(steps)),
            "mock-model",
            0.2,
            Arc::new(registry),
        );
        Session::new(agent, ConversationHistory::new(), Some("You are a test agent."))
    }

    #[tokio::test]
    async fn seeds_system_prompt_with_tools() {
        let session = session(vec![], ToolRegistry::new().with(Arc::new(RecordingTool::new("echo"))));
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].role, Role::System);
        assert!(snapshot.messages[0].content.starts_with("You are a test agent."));
        assert!(snapshot.messages[0].content.contains("### echo"));
        assert!(!snapshot.is_streaming);
        assert!(!snapshot.is_cancellable);
    }

    #[tokio::test]
    async fn submit_runs_a_turn() {
        let session = session(vec![Step::reply("Final Answer: hi")], ToolRegistry::new());
        let outcome = session.submit("hello").await.unwrap();
        assert_eq!(outcome.text(), Some("hi"));
        assert!(!session.is_busy());
        assert_eq!(session.snapshot().await.messages.len(), 3);
    }

    #[tokio::test]
    async fn cancel_without_turn_is_noop() {
        let session = session(vec![Step::reply("Final Answer: hi")], ToolRegistry::new());
        assert!(!session.request_cancel());
        let outcome = session.submit("hello").await.unwrap();
        assert_eq!(outcome.text(), Some("hi"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancel_accepted_right_after_submit_reaches_the_turn() {
        for _ in 0..16 {
            let session = Arc::new(session(
                vec![Step::reply("Action:\n<slow></slow>")],
                ToolRegistry::new().with(Arc::new(SlowTool::new("slow", 20))),
            ));
            let running = {
                let session = session.clone();
                tokio::spawn(async move { session.submit("go").await })
            };
            while !session.request_cancel() {
                tokio::task::yield_now().await;
            }
            let outcome = running.await.unwrap().unwrap();
            assert!(matches!(outcome, TurnOutcome::Cancelled { .. }));
        }
    }

    #[tokio::test]
    async fn concurrent_submit_is_rejected_and_cancel_stops_turn() {
        let session = Arc::new(session(
            vec![Step::reply("Action:\n<slow></slow>")],
            ToolRegistry::new().with(Arc::new(SlowTool::new("slow", 200))),
        ));

        let running = {
            let session = session.clone();
            tokio::spawn(async move { session.submit("go").await })
        };
        while !session.is_busy() {
            tokio::task::yield_now().await;
        }

        let err = session.submit("again").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Conversation(ConversationError::TurnInProgress)
        ));
        assert!(matches!(
            session.reset().await,
            Err(Error::Conversation(ConversationError::TurnInProgress))
        ));

        assert!(session.request_cancel());
        let snapshot = session.snapshot().await;
        assert!(snapshot.is_cancellable);
        assert!(snapshot.cancel_requested);

        // The slow tool finishes, then the loop observes the token
        let outcome = running.await.unwrap().unwrap();
        assert_eq!(outcome, TurnOutcome::Cancelled { iterations: 1 });
        assert!(!session.is_busy());
        assert!(!session.snapshot().await.cancel_requested);
    }

    #[tokio::test]
    async fn reset_keeps_system_prompt() {
        let session = session(vec![Step::reply("Final Answer: hi")], ToolRegistry::new());
        session.submit("hello").await.unwrap();
        session.reset().await.unwrap();
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].role, Role::System);
    }
}
