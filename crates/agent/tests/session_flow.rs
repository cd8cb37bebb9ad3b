//! End-to-end tests for the Forgeloop orchestration loop.
//!
//! These drive the public `Session` facade with a scripted streaming
//! provider and the real built-in tools against a temporary workspace.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use forgeloop_agent::{
    AgentLoop, ConversationHistory, Session, Summarizer, SummaryError, TurnOutcome,
};
use forgeloop_config::ToolsConfig;
use forgeloop_core::agent::{ActionEncoding, CompressionLevel, SummarizationPolicy};
use forgeloop_core::error::ProviderError;
use forgeloop_core::message::{Message, Role};
use forgeloop_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ── Mock Provider ────────────────────────────────────────────────────────

/// Streams scripted replies word by word.
struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured("streaming only".into()))
    }

    async fn stream(
        &self,
        request: ProviderRequest,
        _cancel: CancellationToken,
    ) -> Result<ChunkReceiver, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedProvider exhausted");

        let (tx, rx) = mpsc::channel(1024);
        for word in reply.split_inclusive(' ') {
            tx.try_send(Ok(StreamChunk::text(word))).unwrap();
        }
        tx.try_send(Ok(StreamChunk::done(None))).unwrap();
        Ok(rx)
    }
}

/// Records transcripts and answers with a fixed summary.
struct FixedSummarizer {
    transcripts: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl Summarizer for FixedSummarizer {
    async fn summarize(
        &self,
        transcript: &str,
        _level: CompressionLevel,
        _max_tokens: u32,
    ) -> Result<String, SummaryError> {
        self.transcripts.lock().unwrap().push(transcript.to_string());
        Ok("the user asked two questions".into())
    }
}

fn session_with(
    provider: Arc<ScriptedProvider>,
    encoding: ActionEncoding,
    history: ConversationHistory,
) -> Session {
    let tools = Arc::new(forgeloop_tools::default_registry(&ToolsConfig::default()));
    let agent = AgentLoop::new(provider, "mock-model", 0.0, tools)
        .with_max_iterations(6)
        .with_action_encoding(encoding);
    Session::new(agent, history, None)
}

fn session(provider: Arc<ScriptedProvider>) -> Session {
    session_with(provider, ActionEncoding::Tagged, ConversationHistory::new())
}

fn user_messages(messages: &[Message]) -> Vec<&str> {
    messages
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .collect()
}

// ── E2E ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_direct_answer() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        "Thought: no tools needed\nFinal Answer: Rust has no garbage collector.".into(),
    ]));
    let session = session(provider.clone());

    let outcome = session.submit("Does Rust have a GC?").await.unwrap();
    assert_eq!(
        outcome,
        TurnOutcome::Final {
            answer: "Rust has no garbage collector.".into(),
            iterations: 1
        }
    );
    assert_eq!(provider.calls(), 1);

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.messages.len(), 3);
    assert!(snapshot.pending.is_none());
    assert!(!snapshot.is_streaming);
}

#[tokio::test]
async fn e2e_failed_read_is_corrected_by_the_model() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("notes.txt");
    std::fs::write(&good, "remember the milk\n").unwrap();
    let bad = dir.path().join("note.txt");

    let provider = Arc::new(ScriptedProvider::new(vec![
        format!(
            "Thought: read the notes\nAction:\n<read_file><path>{}</path></read_file>",
            bad.display()
        ),
        format!(
            "Thought: wrong name, retry\nAction:\n<read_file><path>{}</path></read_file>",
            good.display()
        ),
        "Final Answer: You need to remember the milk.".into(),
    ]));
    let session = session(provider.clone());

    let outcome = session.submit("What do my notes say?").await.unwrap();
    assert_eq!(outcome.iterations(), 3);
    assert_eq!(outcome.text(), Some("You need to remember the milk."));

    let snapshot = session.snapshot().await;
    let users = user_messages(&snapshot.messages);
    assert_eq!(users.len(), 3);
    assert!(users[1].starts_with("Tool 'read_file' failed with error:"));
    assert!(users[1].contains("cannot read"));
    assert!(users[1].contains(&bad.display().to_string()));
    assert_eq!(
        users[2],
        "Tool 'read_file' returned:\nremember the milk\n"
    );
}

#[tokio::test]
async fn e2e_parallel_tools_with_one_failure() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("lib.rs"), "pub fn forge() {}\n").unwrap();
    let root = dir.path().display().to_string();

    let provider = Arc::new(ScriptedProvider::new(vec![
        format!(
            "Thought: look around\nAction:\n\
             <list_directory><path>{root}</path></list_directory>\n\
             <search_files><pattern>fn forge</pattern><paths>{root}</paths></search_files>\n\
             <read_file><path>{root}/missing.rs</path></read_file>"
        ),
        "Final Answer: forge() is defined in lib.rs.".into(),
    ]));
    let session = session(provider);

    let outcome = session.submit("Where is forge defined?").await.unwrap();
    assert_eq!(outcome.iterations(), 2);

    let snapshot = session.snapshot().await;
    let report = user_messages(&snapshot.messages)[1];
    assert!(report.starts_with("1 of 3 tools failed."));
    assert!(report.contains("[list_directory] succeeded:\nlib.rs"));
    assert!(report.contains("lib.rs:1: pub fn forge() {}"));
    assert!(report.contains("[read_file] failed:"));
    assert_eq!(report.matches("Retry the same tool").count(), 1);
}

#[tokio::test]
async fn e2e_structured_encoding_coerces_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("long.txt");
    std::fs::write(&file, "one\ntwo\nthree\nfour\n").unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![
        format!(
            r#"Thought: peek
Action: {{"name": "read_file", "parameters": {{"path": "{}", "max_lines": 2}}}}"#,
            file.display()
        ),
        "Final Answer: It starts with one, two.".into(),
    ]));
    let session = session_with(
        provider,
        ActionEncoding::Structured,
        ConversationHistory::new(),
    );

    session.submit("Peek at long.txt").await.unwrap();

    let snapshot = session.snapshot().await;
    assert!(snapshot.messages[0].content.contains(r#"{"name": "read_file""#));
    assert_eq!(
        user_messages(&snapshot.messages)[1],
        "Tool 'read_file' returned:\none\ntwo\n[... 2 more lines]"
    );
}

#[tokio::test]
async fn e2e_history_is_summarized_across_turns() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        "Final Answer: first reply".into(),
        "Final Answer: second reply".into(),
    ]));
    let summarizer = Arc::new(FixedSummarizer {
        transcripts: Mutex::new(Vec::new()),
    });
    let policy = SummarizationPolicy {
        max_context_tokens: 1,
        ..SummarizationPolicy::default()
    };
    let history = ConversationHistory::new().with_summarizer(summarizer.clone(), policy);
    let session = session_with(provider, ActionEncoding::Tagged, history);

    session.submit("first question").await.unwrap();
    session.submit("second question").await.unwrap();

    let transcripts = summarizer.transcripts.lock().unwrap().clone();
    assert_eq!(transcripts.len(), 1);
    assert!(transcripts[0].contains("user: first question"));
    assert!(transcripts[0].contains("assistant: Final Answer: first reply"));

    let snapshot = session.snapshot().await;
    let contents: Vec<&str> = snapshot.messages[1..]
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(
        contents,
        vec![
            "[2 messages compressed]: the user asked two questions",
            "second question",
            "Final Answer: second reply",
        ]
    );
    assert_eq!(snapshot.messages[0].role, Role::System);
}

#[tokio::test]
async fn e2e_blocked_shell_command_is_reported() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        "Action:\n<shell><command>rm -rf /tmp/nothing</command></shell>".into(),
        "Final Answer: I am not allowed to delete files.".into(),
    ]));
    let session = session(provider);

    session.submit("Clean up").await.unwrap();

    let snapshot = session.snapshot().await;
    let feedback = user_messages(&snapshot.messages)[1];
    assert!(feedback.starts_with("Tool 'shell' failed with error: Permission denied"));
    assert!(feedback.contains("<shell><command>rm -rf /tmp/nothing</command></shell>"));
}
