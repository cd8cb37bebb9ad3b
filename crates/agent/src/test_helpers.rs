//! Shared test helpers for loop, dispatch and session tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use forgeloop_core::error::{ProviderError, ToolError};
use forgeloop_core::message::Message;
use forgeloop_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage,
};
use forgeloop_core::tool::{ParamType, ParameterSchema, Tool, ToolArgs};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One scripted model call.
pub enum Step {
    /// Stream these fragments, then finish normally.
    Reply(Vec<String>),
    /// Stream `before`, trigger the turn's cancellation token, then keep
    /// streaming `after` as a provider that ignores cancellation would.
    CancelMidStream { before: Vec<String>, after: Vec<String> },
    /// Fail the call with a transport error.
    Fail(ProviderError),
}

impl Step {
    /// A reply streamed in small fragments.
    pub fn reply(text: &str) -> Self {
        Step::Reply(fragments(text))
    }
}

/// Split text into 7-byte (char-aligned) fragments to exercise reassembly.
pub fn fragments(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if current.len() >= 7 {
            out.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// A streaming provider that plays back scripted steps and records every
/// request it receives.
///
/// Panics if more calls are made than steps provided.
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_step(&self, request: ProviderRequest) -> Step {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request);
        self.steps.lock().unwrap().pop_front().unwrap_or_else(|| {
            panic!(
                "ScriptedProvider: no more steps (call #{})",
                requests.len()
            )
        })
    }
}

fn usage() -> Usage {
    Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        match self.next_step(request) {
            Step::Reply(parts) => Ok(ProviderResponse {
                message: Message::assistant(parts.concat()),
                usage: Some(usage()),
                model: "mock-model".into(),
            }),
            Step::CancelMidStream { .. } => Err(ProviderError::Cancelled),
            Step::Fail(e) => Err(e),
        }
    }

    async fn stream(
        &self,
        request: ProviderRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkReceiver, ProviderError> {
        let step = self.next_step(request);
        let (tx, rx) = mpsc::channel(256);

        match step {
            Step::Reply(parts) => {
                for part in parts {
                    let _ = tx.try_send(Ok(StreamChunk::text(part)));
                }
                let _ = tx.try_send(Ok(StreamChunk::done(Some(usage()))));
            }
            Step::CancelMidStream { before, after } => {
                for part in before {
                    let _ = tx.try_send(Ok(StreamChunk::text(part)));
                }
                cancel.cancel();
                for part in after {
                    let _ = tx.try_send(Ok(StreamChunk::text(part)));
                }
                let _ = tx.try_send(Ok(StreamChunk::done(None)));
            }
            Step::Fail(e) => return Err(e),
        }

        Ok(rx)
    }
}

/// Echoes its coerced arguments back as a JSON object and records them.
pub struct RecordingTool {
    name: String,
    calls: Mutex<Vec<ToolArgs>>,
}

impl RecordingTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ToolArgs> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Echo the arguments back"
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new()
            .optional("text", ParamType::String, None, "Text to echo")
            .optional("count", ParamType::Number, None, "A number")
            .optional("flag", ParamType::Boolean, None, "A flag")
    }

    async fn execute(&self, args: ToolArgs) -> Result<Value, ToolError> {
        self.calls.lock().unwrap().push(args.clone());
        Ok(Value::Object(args))
    }
}

/// Always fails with the given reason.
pub struct FailingTool {
    name: String,
    reason: String,
}

impl FailingTool {
    pub fn new(name: &str, reason: &str) -> Self {
        Self {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new()
    }

    async fn execute(&self, _args: ToolArgs) -> Result<Value, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: self.name.clone(),
            reason: self.reason.clone(),
        })
    }
}

/// Fails on the first `failures` calls, then returns `"ok: <path>"`.
pub struct FlakyTool {
    name: String,
    remaining_failures: Mutex<usize>,
    reason: String,
}

impl FlakyTool {
    pub fn new(name: &str, failures: usize, reason: &str) -> Self {
        Self {
            name: name.to_string(),
            remaining_failures: Mutex::new(failures),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl Tool for FlakyTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Fails a fixed number of times, then succeeds"
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new().required("path", ParamType::String, "A path")
    }

    async fn execute(&self, args: ToolArgs) -> Result<Value, ToolError> {
        {
            let mut remaining = self.remaining_failures.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ToolError::ExecutionFailed {
                    tool_name: self.name.clone(),
                    reason: self.reason.clone(),
                });
            }
        }
        let path = args.get("path").and_then(Value::as_str).unwrap_or_default();
        Ok(Value::String(format!("ok: {path}")))
    }
}

/// Sleeps before answering `"done"`.
pub struct SlowTool {
    name: String,
    delay: Duration,
}

impl SlowTool {
    pub fn new(name: &str, delay_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            delay: Duration::from_millis(delay_ms),
        }
    }
}

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Sleeps, then succeeds"
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new()
    }

    async fn execute(&self, _args: ToolArgs) -> Result<Value, ToolError> {
        tokio::time::sleep(self.delay).await;
        Ok(Value::String("done".into()))
    }
}
