//! The agent reasoning loop implementation.

use std::sync::Arc;

use forgeloop_config::AppConfig;
use forgeloop_core::agent::{ActionEncoding, MAX_ITERATIONS_CEILING};
use forgeloop_core::message::Role;
use forgeloop_core::protocol::{Actions, ToolCallRequest};
use forgeloop_core::provider::{Provider, ProviderRequest, Usage};
use forgeloop_core::tool::ToolRegistry;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::ConversationHistory;
use crate::dispatch::{ToolDispatcher, aggregate};
use crate::feedback;
use crate::protocol::ResponseParser;
use crate::stream_event::AgentStreamEvent;
use crate::transport::{ModelStream, TransportEvent};

/// Returned when a turn runs out of iterations without a final answer.
pub const ITERATION_LIMIT_MESSAGE: &str = "I've reached the maximum number of iterations for \
this request without reaching a final answer. Please provide further guidance.";

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model chose to stop.
    Final { answer: String, iterations: usize },
    /// The turn's cancellation token fired.
    Cancelled { iterations: usize },
    /// The iteration ceiling was hit.
    LimitReached { message: String, iterations: usize },
}

impl TurnOutcome {
    pub fn iterations(&self) -> usize {
        match self {
            TurnOutcome::Final { iterations, .. }
            | TurnOutcome::Cancelled { iterations }
            | TurnOutcome::LimitReached { iterations, .. } => *iterations,
        }
    }

    /// Text to show the user, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            TurnOutcome::Final { answer, .. } => Some(answer),
            TurnOutcome::LimitReached { message, .. } => Some(message),
            TurnOutcome::Cancelled { .. } => None,
        }
    }
}

/// The core agent loop that orchestrates model calls and tool execution.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Default max tokens per response
    max_tokens: Option<u32>,

    encoding: ActionEncoding,
    parser: ResponseParser,
    dispatcher: ToolDispatcher,

    /// Maximum model calls per turn
    max_iterations: u32,

    /// Optional sink for live events
    events: Option<mpsc::Sender<AgentStreamEvent>>,
}

impl AgentLoop {
    /// Create a new agent loop using the tagged action encoding.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            encoding: ActionEncoding::Tagged,
            parser: ResponseParser::new(ActionEncoding::Tagged),
            dispatcher: ToolDispatcher::new(tools),
            max_iterations: 25,
            events: None,
        }
    }

    /// Create an agent loop from application configuration.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        config: &AppConfig,
    ) -> Self {
        Self::new(
            provider,
            config.default_model.clone(),
            config.default_temperature,
            tools,
        )
        .with_max_tokens(config.default_max_tokens)
        .with_max_iterations(config.agent.max_iterations)
        .with_action_encoding(config.agent.action_encoding)
    }

    /// Set the maximum number of model calls per turn (clamped to `1..=100`).
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.clamp(1, MAX_ITERATIONS_CEILING);
        self
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Select the action grammar the parser accepts.
    pub fn with_action_encoding(mut self, encoding: ActionEncoding) -> Self {
        self.encoding = encoding;
        self.parser = ResponseParser::new(encoding);
        self
    }

    /// Publish live events on `tx`.
    pub fn with_events(mut self, tx: mpsc::Sender<AgentStreamEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.dispatcher.registry()
    }

    pub fn provider(&self) -> Arc<dyn Provider> {
        self.provider.clone()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn action_encoding(&self) -> ActionEncoding {
        self.encoding
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Run one user turn to completion, cancellation or the iteration limit.
    ///
    /// Appends the user message, then alternates streaming model calls and
    /// tool dispatch. Tool failures are fed back to the model; only
    /// transport errors and transaction misuse end the turn with an error.
    pub async fn run_turn(
        &self,
        history: &RwLock<ConversationHistory>,
        user_text: &str,
        cancel: &CancellationToken,
    ) -> forgeloop_core::Result<TurnOutcome> {
        info!(
            model = %self.model,
            max_iterations = self.max_iterations,
            "Starting turn"
        );

        history.write().await.add_message(Role::User, user_text).await;

        let mut usage: Option<Usage> = None;
        let mut tool_calls_made = 0;

        for iteration in 1..=self.max_iterations as usize {
            if cancel.is_cancelled() {
                return Ok(self.cancelled(iteration - 1).await);
            }

            debug!(iteration, "Agent loop iteration");

            let Some(text) = self.stream_iteration(history, cancel, &mut usage).await? else {
                return Ok(self.cancelled(iteration).await);
            };

            let Some(parsed) = self.parser.parse(&text) else {
                debug!(iteration, "Response has no protocol sections, treating as final");
                let answer = text.trim().to_string();
                return Ok(self.finish(answer, iteration, tool_calls_made, usage).await);
            };

            if let Some(reasoning) = &parsed.reasoning {
                self.emit(AgentStreamEvent::Thought {
                    content: reasoning.clone(),
                })
                .await;
            }

            match parsed.actions {
                None => {
                    let answer = parsed
                        .final_answer
                        .unwrap_or_else(|| text.trim().to_string());
                    return Ok(self.finish(answer, iteration, tool_calls_made, usage).await);
                }
                Some(Actions::Single(call)) => {
                    tool_calls_made += 1;
                    let message = self.dispatch_single(&call, iteration).await;
                    history.write().await.add_message(Role::User, message).await;
                }
                Some(Actions::Multiple(calls)) => {
                    tool_calls_made += calls.len();
                    let message = self.dispatch_parallel(&calls, iteration).await;
                    history.write().await.add_message(Role::User, message).await;
                }
            }
        }

        warn!(
            iterations = self.max_iterations,
            "Max iterations reached without a final answer"
        );
        self.emit(AgentStreamEvent::Done {
            usage,
            iterations: self.max_iterations as usize,
            tool_calls_made,
        })
        .await;

        Ok(TurnOutcome::LimitReached {
            message: ITERATION_LIMIT_MESSAGE.to_string(),
            iterations: self.max_iterations as usize,
        })
    }

    /// One streaming model call. Fragments go both into the returned text
    /// and into the history's streaming transaction, which is committed when
    /// the stream completes. Returns `None` if cancelled.
    async fn stream_iteration(
        &self,
        history: &RwLock<ConversationHistory>,
        cancel: &CancellationToken,
        usage: &mut Option<Usage>,
    ) -> forgeloop_core::Result<Option<String>> {
        let mut request = ProviderRequest::new(self.model.clone(), history.read().await.history());
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request.stream = true;

        let mut stream = match ModelStream::open(self.provider.as_ref(), request, cancel).await {
            Ok(stream) => stream,
            Err(e) if e.is_cancelled() => return Ok(None),
            Err(e) => {
                self.emit_error(&e).await;
                return Err(e.into());
            }
        };

        history.write().await.start_append_token()?;
        let mut text = String::new();

        loop {
            match stream.next().await {
                Ok(TransportEvent::Fragment(fragment)) => {
                    history.write().await.append_token(&fragment)?;
                    text.push_str(&fragment);
                    self.emit(AgentStreamEvent::Chunk { content: fragment }).await;
                }
                Ok(TransportEvent::Done) => break,
                Ok(TransportEvent::Cancelled) => {
                    history.write().await.cancel_append_token()?;
                    return Ok(None);
                }
                Err(e) => {
                    history.write().await.cancel_append_token()?;
                    self.emit_error(&e).await;
                    return Err(e.into());
                }
            }
        }

        history.write().await.commit_append_token()?;
        if let Some(chunk_usage) = stream.usage() {
            add_usage(usage, chunk_usage);
        }
        Ok(Some(text))
    }

    async fn dispatch_single(&self, call: &ToolCallRequest, iteration: usize) -> String {
        let id = format!("call_{iteration}_0");
        self.emit_tool_call(&id, call).await;

        let outcome = self.dispatcher.execute(call).await;
        self.emit(AgentStreamEvent::ToolResult {
            id,
            name: outcome.tool_name.clone(),
            output: outcome
                .result
                .clone()
                .or_else(|| outcome.error.clone())
                .unwrap_or_default(),
            success: outcome.success,
        })
        .await;

        if outcome.success {
            feedback::tool_success(&outcome)
        } else {
            feedback::tool_failure(&outcome, call)
        }
    }

    async fn dispatch_parallel(&self, calls: &[ToolCallRequest], iteration: usize) -> String {
        debug!(iteration, count = calls.len(), "Dispatching tools in parallel");
        for (idx, call) in calls.iter().enumerate() {
            self.emit_tool_call(&format!("call_{iteration}_{idx}"), call).await;
        }

        let outcomes = self.dispatcher.execute_all(calls).await;
        for (idx, outcome) in outcomes.iter().enumerate() {
            self.emit(AgentStreamEvent::ToolResult {
                id: format!("call_{iteration}_{idx}"),
                name: outcome.tool_name.clone(),
                output: outcome
                    .result
                    .clone()
                    .or_else(|| outcome.error.clone())
                    .unwrap_or_default(),
                success: outcome.success,
            })
            .await;
        }

        let outcome = aggregate(outcomes);
        feedback::parallel_report(&outcome)
    }

    async fn finish(
        &self,
        answer: String,
        iterations: usize,
        tool_calls_made: usize,
        usage: Option<Usage>,
    ) -> TurnOutcome {
        info!(iterations, tool_calls_made, "Turn finished");
        self.emit(AgentStreamEvent::Done {
            usage,
            iterations,
            tool_calls_made,
        })
        .await;
        TurnOutcome::Final { answer, iterations }
    }

    async fn cancelled(&self, iterations: usize) -> TurnOutcome {
        info!(iterations, "Turn cancelled");
        self.emit(AgentStreamEvent::Cancelled { iterations }).await;
        TurnOutcome::Cancelled { iterations }
    }

    async fn emit_tool_call(&self, id: &str, call: &ToolCallRequest) {
        self.emit(AgentStreamEvent::ToolCall {
            id: id.to_string(),
            name: call.name.clone(),
            input: serde_json::to_value(&call.raw_parameters).unwrap_or_default(),
        })
        .await;
    }

    async fn emit_error(&self, error: &forgeloop_core::error::ProviderError) {
        warn!(error = %error, "Model call failed");
        self.emit(AgentStreamEvent::Error {
            message: error.to_string(),
        })
        .await;
    }

    async fn emit(&self, event: AgentStreamEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver just means nobody is watching
            let _ = tx.send(event).await;
        }
    }
}

fn add_usage(total: &mut Option<Usage>, chunk: &Usage) {
    let sum = total.get_or_insert(Usage {
        prompt_tokens: 0,
        completion_tokens: 0,
        total_tokens: 0,
    });
    sum.prompt_tokens += chunk.prompt_tokens;
    sum.completion_tokens += chunk.completion_tokens;
    sum.total_tokens += chunk.total_tokens;
}
